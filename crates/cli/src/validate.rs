//! `hips validate` and `hips ingest`.

use std::path::{Path, PathBuf};

use hips_io::{json, Store};
use hips_recon::{validate_dir, Outcome, Schema, Severity, ValidateOptions, ValidationReport};

use crate::render::render_tree;
use crate::{CliError, Context};

/// Run the engine and print the diagnostic tree unless it was streamed or suppressed.
fn run(ctx: &Context, dir: &Path, schema: &Schema, options: ValidateOptions, quiet: bool) -> ValidationReport {
    let report = validate_dir(dir, schema, &options);

    // --verbose already streamed every diagnostic through the logger
    if !quiet && !ctx.verbose {
        eprint!("{}", render_tree(&report.diagnostics, Severity::Info, ctx.color));
    }
    report
}

/// Map a finished run to its exit status.
fn outcome_result(report: &ValidationReport, dir: &Path) -> Result<(), CliError> {
    match report.outcome {
        Outcome::Valid => Ok(()),
        Outcome::Invalid => Err(CliError::invalid(format!(
            "{} is invalid ({} errors, {} warnings in {} of {} files)",
            dir.display(),
            report.summary.errors,
            report.summary.warnings,
            report.summary.files_failed,
            report.summary.files,
        ))),
        Outcome::Aborted => {
            let message = report
                .diagnostics
                .iter()
                .rev()
                .find(|d| d.severity == Severity::Critical)
                .map(|d| d.message.clone())
                .unwrap_or_else(|| "validation aborted".to_string());
            Err(CliError::schema(message).with_hint("the schema documents do not cover this data"))
        }
    }
}

pub fn cmd_validate(
    ctx: &Context,
    dir: PathBuf,
    schema_flag: Option<PathBuf>,
    options: ValidateOptions,
    json_output: bool,
    output: Option<PathBuf>,
    quiet: bool,
) -> Result<(), CliError> {
    let schema = ctx.load_schema(schema_flag)?;
    let report = run(ctx, &dir, &schema, options, quiet);

    if json_output {
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::io(format!("failed to serialize report: {}", e)))?;
        println!("{}", text);
    }

    if let Some(path) = &output {
        match &report.record {
            Some(record) => {
                json::write_record(record, path)
                    .map_err(|e| CliError::io(format!("failed to write {}: {}", path.display(), e)))?;
                tracing::debug!("Wrote record to {}", path.display());
            }
            None => {
                return outcome_result(&report, &dir)
                    .map_err(|e| e.with_hint(format!("no record written to {}", path.display())));
            }
        }
    }

    outcome_result(&report, &dir)
}

pub fn cmd_ingest(
    ctx: &Context,
    dir: PathBuf,
    schema_flag: Option<PathBuf>,
    options: ValidateOptions,
    db: Option<PathBuf>,
    quiet: bool,
) -> Result<(), CliError> {
    let schema = ctx.load_schema(schema_flag)?;
    let report = run(ctx, &dir, &schema, options, quiet);
    outcome_result(&report, &dir).map_err(|e| e.with_hint("nothing was ingested"))?;

    let Some(record) = &report.record else {
        return Err(CliError::invalid("validation produced no record"));
    };

    let db_path = ctx.store_path(db);
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| CliError::io(format!("failed to create {}: {}", parent.display(), e)))?;
    }

    let mut store = Store::open(&db_path).map_err(CliError::store)?;
    let id = store.ingest(record, &schema.nucleus_columns()).map_err(CliError::store)?;

    println!(
        "Ingested {} as image {} ({} regions, {} nuclei) into {}",
        record.image_name,
        id,
        record.regions.len(),
        record.nucleus_count(),
        db_path.display(),
    );
    Ok(())
}
