pub mod config;
pub mod rows;
pub mod synth;
pub mod traits;
