use std::fmt;

use crate::model::Dataset;

/// Errors that abort a whole validation run.
///
/// Everything here means the engine cannot trust its own configuration.
/// Problems with the data itself are never errors; they are reported as
/// [`Diagnostic`](crate::diagnostics::Diagnostic)s and the run continues.
#[derive(Debug)]
pub enum HipsError {
    /// A schema document could not be read or deserialized.
    SchemaParse { document: String, message: String },
    /// Schema documents parsed but are inconsistent with each other.
    SchemaValidation(String),
    /// A field reached the converter without a type-map entry.
    UntypedField { dataset: Dataset, field: String },
    /// An enum-tagged field has no registered legal values.
    UnregisteredEnum { dataset: Dataset, field: String },
    /// The schema directory or one of its documents could not be read.
    Io(String),
}

impl fmt::Display for HipsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaParse { document, message } => {
                write!(f, "failed to load {document}: {message}")
            }
            Self::SchemaValidation(msg) => write!(f, "schema validation error: {msg}"),
            Self::UntypedField { dataset, field } => {
                write!(f, "field '{field}' has no type in {dataset} types")
            }
            Self::UnregisteredEnum { dataset, field } => {
                write!(f, "field '{field}' is not registered as an enum type in {dataset} types")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for HipsError {}
