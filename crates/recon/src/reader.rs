//! Dataset reader: directory listing, file-set pairing and CSV parsing.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::diagnostics::{DiagnosticPath, Diagnostics};
use crate::model::{Dataset, RawRow, Row};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    NotADirectory(PathBuf),
    Io { path: PathBuf, message: String },
    Csv { path: PathBuf, message: String },
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotADirectory(path) => write!(f, "No such directory {}", path.display()),
            Self::Io { path, message } => write!(f, "Failed to read {}: {message}", path.display()),
            Self::Csv { path, message } => write!(f, "Failed to parse {}: {message}", path.display()),
        }
    }
}

impl std::error::Error for ReadError {}

/// The two subdirectories do not hold the same file names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileNameMismatch {
    pub meta_only: Vec<String>,
    pub props_only: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingError {
    Read(ReadError),
    Mismatch(FileNameMismatch),
}

impl From<ReadError> for PairingError {
    fn from(e: ReadError) -> Self {
        Self::Read(e)
    }
}

// ---------------------------------------------------------------------------
// Directory listing
// ---------------------------------------------------------------------------

/// Names of the regular files in `dir`, following symlinks. Dangling links are skipped.
pub fn list_dir(dir: &Path) -> Result<BTreeSet<String>, ReadError> {
    if !dir.is_dir() {
        return Err(ReadError::NotADirectory(dir.to_path_buf()));
    }

    let io_err = |e: std::io::Error| ReadError::Io {
        path: dir.to_path_buf(),
        message: e.to_string(),
    };

    let mut names = BTreeSet::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let is_file = match std::fs::metadata(entry.path()) {
            Ok(meta) => meta.is_file(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(io_err(e)),
        };
        if !is_file {
            continue;
        }
        names.insert(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// File names shared by both dataset directories. The two sets must be identical.
pub fn read_paired(meta_dir: &Path, props_dir: &Path) -> Result<BTreeSet<String>, PairingError> {
    let meta = list_dir(meta_dir)?;
    let props = list_dir(props_dir)?;

    if meta != props {
        return Err(PairingError::Mismatch(FileNameMismatch {
            meta_only: meta.difference(&props).cloned().collect(),
            props_only: props.difference(&meta).cloned().collect(),
        }));
    }
    Ok(meta)
}

// ---------------------------------------------------------------------------
// CSV parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CsvTable {
    pub dataset: Dataset,
    /// Header names in file order.
    pub fields: Vec<String>,
    /// Header names that appear more than once.
    pub duplicate_fields: Vec<String>,
    pub rows: Vec<RawRow>,
    /// Record numbers of rows with more cells than the header.
    pub overlong_rows: Vec<usize>,
}

impl CsvTable {
    pub fn observed_fields(&self) -> BTreeSet<String> {
        self.fields.iter().cloned().collect()
    }
}

/// Parse one CSV file. Short rows leave their trailing fields absent;
/// extra cells on long rows are dropped and the row is recorded.
pub fn parse_csv(path: &Path, dataset: Dataset) -> Result<CsvTable, ReadError> {
    let csv_err = |e: csv::Error| ReadError::Csv {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let fields: Vec<String> = reader.headers().map_err(csv_err)?.iter().map(String::from).collect();

    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for field in &fields {
        if !seen.insert(field.as_str()) {
            duplicates.insert(field.clone());
        }
    }

    let mut rows = Vec::new();
    let mut overlong_rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(csv_err)?;
        let number = idx + 1;
        if record.len() > fields.len() {
            overlong_rows.push(number);
        }

        let mut row = Row::new(number);
        for (i, field) in fields.iter().enumerate() {
            row.fields.insert(field.clone(), record.get(i).map(String::from));
        }
        rows.push(row);
    }

    Ok(CsvTable {
        dataset,
        fields,
        duplicate_fields: duplicates.into_iter().collect(),
        rows,
        overlong_rows,
    })
}

// ---------------------------------------------------------------------------
// Field-set comparison
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSetDiff {
    pub missing: Vec<String>,
    pub extra: Vec<String>,
}

impl FieldSetDiff {
    pub fn between(observed: &BTreeSet<String>, expected: &BTreeSet<String>) -> Self {
        Self {
            missing: expected.difference(observed).cloned().collect(),
            extra: observed.difference(expected).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

/// Exact set equality; a mismatch is reported with both sides of the difference.
pub fn fields_match(
    observed: &BTreeSet<String>,
    expected: &BTreeSet<String>,
    diags: &mut Diagnostics,
    path: &DiagnosticPath,
) -> bool {
    let diff = FieldSetDiff::between(observed, expected);
    if diff.is_empty() {
        return true;
    }
    diags.structural(
        path,
        format!(
            "Fields mismatch: missing [{}], extra [{}]",
            diff.missing.join(", "),
            diff.extra.join(", ")
        ),
    );
    false
}
