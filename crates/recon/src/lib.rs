//! `hips-recon`: Validation and reconciliation engine for HiPS nucleus exports.
//!
//! Pure engine crate: reads an image directory holding paired `nucleiMeta` /
//! `nucleiProps` CSV files, checks them against an explicitly passed
//! [`Schema`], and returns a [`ValidationReport`] carrying every diagnostic
//! plus, for valid runs, the image → region → nucleus record.
//! No CLI or persistence dependencies.

pub mod checks;
pub mod convert;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod filename;
pub mod lint;
pub mod model;
pub mod reader;
pub mod reconcile;
pub mod record;
pub mod schema;

pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticPath, Diagnostics, Severity};
pub use engine::validate_dir;
pub use error::HipsError;
pub use model::{
    Dataset, ImageRecord, NucleusRecord, Outcome, RegionRecord, Summary, ValidateOptions,
    ValidationReport, Value,
};
pub use schema::{NucleusColumn, Schema, StorageType, TypeTag};
