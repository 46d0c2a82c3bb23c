//! Trailgraph library crate.
//!
//! Normalizes CloudTrail audit records into related tables and writes them
//! through pluggable sinks.

pub mod core;
pub mod formats;
pub mod sources;

pub use core::config;
pub use core::rows;
pub use core::traits;
