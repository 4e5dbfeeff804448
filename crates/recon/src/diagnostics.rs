//! Structured diagnostic accumulator.
//!
//! Every problem the engine finds becomes a [`Diagnostic`] with a severity,
//! a kind and a path (image → dataset → file → identity → field). Whether a
//! diagnostic invalidates the run is decided by its [`DiagnosticKind`], not by
//! its severity: a bounding-box mismatch is logged as a warning but still
//! invalidates, while a failed conversion is a warning that does not (the
//! resulting null is caught later by the completeness check).
//!
//! Pushed diagnostics are forwarded to the `log` facade. Rendering them as a
//! nested text log is left to the caller.

use std::fmt;

use serde::Serialize;

use crate::model::Dataset;

// ---------------------------------------------------------------------------
// Severity + kind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    fn log_level(&self) -> log::Level {
        match self {
            Self::Debug => log::Level::Debug,
            Self::Info => log::Level::Info,
            Self::Warning => log::Level::Warn,
            Self::Error | Self::Critical => log::Level::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Progress and outcome messages.
    Progress,
    /// A single value failed type conversion and became null.
    Conversion,
    /// Missing directories, mismatched file sets, field-set mismatches.
    Structural,
    /// Per-file and per-object integrity violations.
    Integrity,
    /// An object excluded from the output under skip-missing.
    Skip,
    /// Heuristic lints that never affect the outcome.
    Advisory,
    /// Configuration errors that aborted the run.
    Fatal,
}

impl DiagnosticKind {
    pub fn invalidates(&self) -> bool {
        matches!(self, Self::Structural | Self::Integrity | Self::Fatal)
    }
}

// ---------------------------------------------------------------------------
// Path
// ---------------------------------------------------------------------------

/// Where a diagnostic applies. Unset components are omitted from JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticPath {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<Dataset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl DiagnosticPath {
    pub fn image(name: &str) -> Self {
        Self {
            image: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn with_file(&self, file: &str) -> Self {
        Self {
            file: Some(file.to_string()),
            ..self.clone()
        }
    }

    pub fn with_dataset(&self, dataset: Dataset) -> Self {
        Self {
            dataset: Some(dataset),
            ..self.clone()
        }
    }

    pub fn with_identity(&self, identity: u64) -> Self {
        Self {
            identity: Some(identity),
            ..self.clone()
        }
    }

    pub fn with_field(&self, field: &str) -> Self {
        Self {
            field: Some(field.to_string()),
            ..self.clone()
        }
    }

    /// Nesting depth below the image: one level for a file, one more for an object.
    pub fn depth(&self) -> usize {
        usize::from(self.file.is_some()) + usize::from(self.identity.is_some())
    }
}

// ---------------------------------------------------------------------------
// Diagnostic + accumulator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    pub path: DiagnosticPath,
}

impl Diagnostic {
    /// Indentation level for nested rendering.
    ///
    /// Progress messages open a scope ("Validating x.csv"), so they sit one
    /// level above the diagnostics that share their path.
    pub fn depth(&self) -> usize {
        let depth = self.path.depth();
        if self.kind == DiagnosticKind::Progress {
            depth.saturating_sub(1)
        } else {
            depth
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        severity: Severity,
        kind: DiagnosticKind,
        path: &DiagnosticPath,
        message: impl Into<String>,
    ) {
        let diagnostic = Diagnostic {
            severity,
            kind,
            message: message.into(),
            path: path.clone(),
        };
        // Log records carry no path, so the tree indent travels in the text.
        log::log!(
            target: "hips_recon",
            severity.log_level(),
            "{:indent$}{}",
            "",
            diagnostic.message,
            indent = 2 * diagnostic.depth()
        );
        self.items.push(diagnostic);
    }

    pub fn debug(&mut self, path: &DiagnosticPath, message: impl Into<String>) {
        self.push(Severity::Debug, DiagnosticKind::Progress, path, message);
    }

    pub fn progress(&mut self, path: &DiagnosticPath, message: impl Into<String>) {
        self.push(Severity::Info, DiagnosticKind::Progress, path, message);
    }

    pub fn conversion(&mut self, path: &DiagnosticPath, message: impl Into<String>) {
        self.push(Severity::Warning, DiagnosticKind::Conversion, path, message);
    }

    pub fn structural(&mut self, path: &DiagnosticPath, message: impl Into<String>) {
        self.push(Severity::Error, DiagnosticKind::Structural, path, message);
    }

    pub fn integrity(&mut self, severity: Severity, path: &DiagnosticPath, message: impl Into<String>) {
        self.push(severity, DiagnosticKind::Integrity, path, message);
    }

    pub fn skip(&mut self, path: &DiagnosticPath, message: impl Into<String>) {
        self.push(Severity::Warning, DiagnosticKind::Skip, path, message);
    }

    pub fn advisory(&mut self, path: &DiagnosticPath, message: impl Into<String>) {
        self.push(Severity::Warning, DiagnosticKind::Advisory, path, message);
    }

    pub fn fatal(&mut self, path: &DiagnosticPath, message: impl Into<String>) {
        self.push(Severity::Critical, DiagnosticKind::Fatal, path, message);
    }

    /// Number of diagnostics that invalidate the run.
    pub fn invalidating(&self) -> usize {
        self.items.iter().filter(|d| d.kind.invalidates()).count()
    }

    pub fn is_invalid(&self) -> bool {
        self.items.iter().any(|d| d.kind.invalidates())
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.items.iter().filter(|d| d.severity == severity).count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}
