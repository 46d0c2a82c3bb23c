//! CloudTrail log normalization.
//!
//! Reads `{"Records": [...]}` files and turns each record into table rows.

pub mod model;
pub mod normalizer;
pub mod reader;
pub mod rules;

pub use model::{AuditRecord, RecordFile};
pub use normalizer::{natural_name, NormalizeOptions, Normalizer};
pub use reader::{collect_inputs, import_files, read_record_file, ImportSummary, ReadError};
pub use rules::{KeyPredicate, ResourceClassifier, ResourceRule, ResourceType};
