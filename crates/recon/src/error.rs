use thiserror::Error;

use crate::model::Source;

#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (bad review bound, empty alternative, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// Fuzzy threshold is zero, negative, or not finite.
    #[error("invalid threshold: {name} = {value} ({reason})")]
    InvalidThreshold {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
    /// No identity fields configured, so no key can be derived.
    #[error("identity field list is empty")]
    EmptyIdentityFields,
    /// A source needed for a file-driven run has no `[sources.*]` entry.
    #[error("source '{0}' is not configured")]
    MissingSource(Source),
    /// CSV decode error.
    #[error("source '{source_name}': CSV error: {message}")]
    Csv { source_name: Source, message: String },
    /// IO error (file read, etc.).
    #[error("IO error: {0}")]
    Io(String),
}
