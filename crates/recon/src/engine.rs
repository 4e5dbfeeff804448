use std::path::Path;

use crate::checks::{check_pair, Verdict};
use crate::convert::{convert_rows, FloatObservations};
use crate::diagnostics::{DiagnosticKind, DiagnosticPath, Diagnostics, Severity};
use crate::error::HipsError;
use crate::filename::RoiDescriptor;
use crate::lint::lint_intfloat;
use crate::model::{
    Dataset, ImageRecord, Outcome, RegionRecord, ReportMeta, Summary, TypedRow, ValidateOptions,
    ValidationReport,
};
use crate::reader::{fields_match, parse_csv, read_paired, CsvTable, PairingError};
use crate::reconcile::{index_by_identity, pair_objects, IdentityError, IdentityIndex};
use crate::record::build_nucleus;
use crate::schema::{NucleusColumn, Schema};

/// Validate one image directory and build its record.
///
/// Never fails: configuration errors found part-way end the run with
/// [`Outcome::Aborted`] and a critical diagnostic.
pub fn validate_dir(data_dir: &Path, schema: &Schema, options: &ValidateOptions) -> ValidationReport {
    let image_name = image_name_of(data_dir);
    let root = DiagnosticPath::image(&image_name);

    let mut run = Run {
        schema,
        options,
        columns: schema.nucleus_columns(),
        diags: Diagnostics::new(),
        record: ImageRecord::new(image_name.clone()),
        summary: Summary::default(),
    };

    run.diags.debug(&root, format!("Scanning data directory {}", data_dir.display()));
    let outcome = match run.scan(data_dir, &image_name, &root) {
        Ok(()) if run.diags.is_invalid() => Outcome::Invalid,
        Ok(()) => Outcome::Valid,
        Err(e) => {
            run.diags.fatal(&root, e.to_string());
            Outcome::Aborted
        }
    };

    if outcome == Outcome::Valid {
        run.diags.progress(&root, "Data directory is valid");
    } else {
        run.diags.push(Severity::Error, DiagnosticKind::Progress, &root, "Data directory is invalid");
    }

    let Run { diags, record, mut summary, .. } = run;
    summary.regions = record.regions.len();
    summary.nuclei = record.nucleus_count();
    summary.errors = diags.count(Severity::Error) + diags.count(Severity::Critical);
    summary.warnings = diags.count(Severity::Warning);

    ValidationReport {
        meta: ReportMeta {
            image_name,
            data_dir: data_dir.display().to_string(),
            options: *options,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        outcome,
        summary,
        diagnostics: diags.into_vec(),
        record: (outcome == Outcome::Valid).then_some(record),
    }
}

/// The directory's own name; falls back to the canonical path for `.` and friends.
fn image_name_of(data_dir: &Path) -> String {
    data_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .or_else(|| {
            let canonical = data_dir.canonicalize().ok()?;
            canonical.file_name().map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| data_dir.display().to_string())
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

struct Run<'a> {
    schema: &'a Schema,
    options: &'a ValidateOptions,
    columns: Vec<NucleusColumn>,
    diags: Diagnostics,
    record: ImageRecord,
    summary: Summary,
}

impl Run<'_> {
    /// Directory-level checks, then every file in name order.
    fn scan(&mut self, data_dir: &Path, image_name: &str, root: &DiagnosticPath) -> Result<(), HipsError> {
        if !data_dir.is_dir() {
            self.diags.structural(root, format!("No such directory {}", data_dir.display()));
            return Ok(());
        }

        let meta_dir = data_dir.join(Dataset::Meta.dir_name());
        let props_dir = data_dir.join(Dataset::Props.dir_name());
        if !meta_dir.is_dir() || !props_dir.is_dir() {
            self.diags.structural(root, "Subdirectories nucleiMeta and nucleiProps must both exist");
            return Ok(());
        }

        let filenames = match read_paired(&meta_dir, &props_dir) {
            Ok(names) => names,
            Err(PairingError::Read(e)) => {
                self.diags.structural(root, e.to_string());
                return Ok(());
            }
            Err(PairingError::Mismatch(mismatch)) => {
                self.diags.structural(root, "Files in nucleiMeta and nucleiProps do not match");
                for (dataset, names) in [(Dataset::Meta, &mismatch.meta_only), (Dataset::Props, &mismatch.props_only)] {
                    if !names.is_empty() {
                        self.diags.structural(
                            &root.with_dataset(dataset),
                            format!("Only in {}: {}", dataset.dir_name(), names.join(", ")),
                        );
                    }
                }
                return Ok(());
            }
        };

        if filenames.is_empty() {
            self.diags.advisory(root, "No files found in nucleiMeta and nucleiProps");
        }

        for filename in &filenames {
            self.summary.files += 1;
            let before = self.diags.invalidating();
            let result = self.validate_file(&meta_dir, &props_dir, filename, image_name, root);
            if result.is_err() || self.diags.invalidating() > before {
                self.summary.files_failed += 1;
            }
            result?;
        }
        Ok(())
    }

    /// DECODE → READ → CONVERT → RECONCILE → CHECK → BUILD for one file pair.
    fn validate_file(
        &mut self,
        meta_dir: &Path,
        props_dir: &Path,
        filename: &str,
        image_name: &str,
        root: &DiagnosticPath,
    ) -> Result<(), HipsError> {
        let path = root.with_file(filename);
        self.diags.progress(&path, format!("Validating {filename}"));

        let Some(roi) = RoiDescriptor::decode(filename) else {
            self.diags.push(
                Severity::Warning,
                DiagnosticKind::Structural,
                &path,
                format!("Filename {filename} does not match the pattern"),
            );
            return Ok(());
        };
        if !roi.matches_directory(image_name) {
            self.diags.integrity(
                Severity::Warning,
                &path,
                format!("Image name for {filename} does not match directory name {image_name}"),
            );
        }

        // Both header sets are checked before giving up on the file
        let meta = self.read_table(meta_dir, filename, Dataset::Meta, &path);
        let props = self.read_table(props_dir, filename, Dataset::Props, &path);
        let (Some(meta), Some(props)) = (meta, props) else {
            return Ok(());
        };

        let meta_rows = self.convert(meta, &path)?;
        let props_rows = self.convert(props, &path)?;

        let meta_index = self.index(meta_rows, Dataset::Meta, filename, &path);
        let props_index = self.index(props_rows, Dataset::Props, filename, &path);
        let (Some(meta_index), Some(props_index)) = (meta_index, props_index) else {
            return Ok(());
        };

        let pairs = match pair_objects(meta_index, props_index) {
            Ok(pairs) => pairs,
            Err(mismatch) => {
                self.diags.integrity(
                    Severity::Error,
                    &path,
                    format!("ObjectCodes in {filename} do not match between meta and props"),
                );
                for (dataset, ids) in [(Dataset::Meta, &mismatch.meta_only), (Dataset::Props, &mismatch.props_only)] {
                    if !ids.is_empty() {
                        self.diags.integrity(
                            Severity::Error,
                            &path.with_dataset(dataset),
                            format!("ObjectCodes only in {dataset}: {}", join_ids(ids)),
                        );
                    }
                }
                return Ok(());
            }
        };

        let mut region = RegionRecord::from_descriptor(&roi);
        for pair in &pairs {
            match check_pair(pair, self.options, &mut self.diags, &path) {
                Verdict::Skipped => self.summary.nuclei_skipped += 1,
                Verdict::Consistent | Verdict::Inconsistent => {
                    region.push_nucleus(build_nucleus(pair, &self.columns));
                }
            }
        }
        self.record.push_region(region);
        Ok(())
    }

    /// Parse one side and check its header. `None` fails the file.
    fn read_table(
        &mut self,
        dir: &Path,
        filename: &str,
        dataset: Dataset,
        path: &DiagnosticPath,
    ) -> Option<CsvTable> {
        let path = path.with_dataset(dataset);
        let table = match parse_csv(&dir.join(filename), dataset) {
            Ok(table) => table,
            Err(e) => {
                self.diags.structural(&path, e.to_string());
                return None;
            }
        };

        if !table.duplicate_fields.is_empty() {
            self.diags.structural(
                &path,
                format!(
                    "{} file {filename} repeats fields: {}",
                    dataset.title(),
                    table.duplicate_fields.join(", ")
                ),
            );
            return None;
        }

        let expected = self.schema.expected_fields(dataset);
        if !fields_match(&table.observed_fields(), &expected, &mut self.diags, &path) {
            self.diags.structural(
                &path,
                format!("{} fields for {filename} do not match expected fields", dataset.title()),
            );
            return None;
        }

        for record in &table.overlong_rows {
            self.diags.integrity(
                Severity::Error,
                &path,
                format!("{} file {filename} record {record} has more cells than the header", dataset.title()),
            );
        }

        Some(table)
    }

    fn convert(&mut self, table: CsvTable, path: &DiagnosticPath) -> Result<Vec<TypedRow>, HipsError> {
        let dataset = table.dataset;
        let mut observations = FloatObservations::new();
        let rows = convert_rows(table.rows, dataset, self.schema, &mut self.diags, path, &mut observations)?;
        if self.options.intfloat_lint {
            lint_intfloat(&observations, &mut self.diags, &path.with_dataset(dataset));
        }
        Ok(rows)
    }

    fn index(
        &mut self,
        rows: Vec<TypedRow>,
        dataset: Dataset,
        filename: &str,
        path: &DiagnosticPath,
    ) -> Option<IdentityIndex> {
        let path = path.with_dataset(dataset);
        match index_by_identity(rows) {
            Ok(index) => Some(index),
            Err(IdentityError::Duplicates(duplicates)) => {
                self.diags.integrity(
                    Severity::Error,
                    &path,
                    format!("Duplicate ObjectCodes found in {dataset} data for {filename}"),
                );
                for dup in duplicates {
                    self.diags.integrity(
                        Severity::Error,
                        &path.with_identity(dup.identity),
                        format!("ObjectCode {} appears {} times", dup.identity, dup.count),
                    );
                }
                None
            }
            Err(IdentityError::Unreadable { record, value }) => {
                let value = value.unwrap_or_else(|| "missing".to_string());
                self.diags.integrity(
                    Severity::Error,
                    &path,
                    format!("Unreadable ObjectCode in {dataset} data for {filename} (record {record}: {value})"),
                );
                None
            }
        }
    }
}
