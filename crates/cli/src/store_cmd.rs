//! `hips list`, `hips delete` and `hips export`: operations on the SQLite store.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use hips_io::{json, ImageId, ImageSummary, Store, StoreError};

use crate::{CliError, Context};

fn open_store(ctx: &Context, db: Option<PathBuf>) -> Result<(Store, PathBuf), CliError> {
    let path = ctx.store_path(db);
    if !path.exists() {
        return Err(CliError::store(StoreError::Sqlite(format!("no database at {}", path.display())))
            .with_hint("run `hips ingest DIR` first, or pass --db PATH"));
    }
    let store = Store::open(&path).map_err(CliError::store)?;
    Ok((store, path))
}

/// Local time for display; stored timestamps are RFC 3339 UTC.
fn display_time(created_at: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(created_at)
        .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| created_at.to_string())
}

fn summaries_json(images: &[ImageSummary]) -> serde_json::Value {
    serde_json::Value::Array(
        images
            .iter()
            .map(|i| {
                serde_json::json!({
                    "id": i.id,
                    "name": i.name,
                    "created_at": i.created_at,
                    "roi_count": i.roi_count,
                    "nucleus_count": i.nucleus_count,
                })
            })
            .collect(),
    )
}

fn write_table(out: &mut impl Write, images: &[ImageSummary]) -> io::Result<()> {
    let name_width = images.iter().map(|i| i.name.len()).max().unwrap_or(0).max(4);
    writeln!(out, "{:>5}  {:<name_width$}  {:>5}  {:>8}  CREATED", "ID", "NAME", "ROIS", "NUCLEI")?;
    for image in images {
        writeln!(
            out,
            "{:>5}  {:<name_width$}  {:>5}  {:>8}  {}",
            image.id,
            image.name,
            image.roi_count,
            image.nucleus_count,
            display_time(&image.created_at),
        )?;
    }
    Ok(())
}

pub fn cmd_list(ctx: &Context, db: Option<PathBuf>, json_output: bool) -> Result<(), CliError> {
    let (store, path) = open_store(ctx, db)?;
    let images = store.list().map_err(CliError::store)?;

    if json_output {
        let text = serde_json::to_string_pretty(&summaries_json(&images))
            .map_err(|e| CliError::io(e.to_string()))?;
        println!("{}", text);
        return Ok(());
    }

    if images.is_empty() {
        eprintln!("No images in {}", path.display());
        return Ok(());
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_table(&mut handle, &images).map_err(|e| CliError::io(e.to_string()))
}

fn confirm(prompt: &str) -> bool {
    eprint!("{} [y/N] ", prompt);
    let _ = io::stderr().flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes")
}

pub fn cmd_delete(
    ctx: &Context,
    ids: Vec<ImageId>,
    all: bool,
    yes: bool,
    db: Option<PathBuf>,
) -> Result<(), CliError> {
    let (mut store, path) = open_store(ctx, db)?;

    let removed = if all {
        let count = store.list().map_err(CliError::store)?.len();
        if !yes {
            if !atty::is(atty::Stream::Stdin) {
                return Err(CliError::usage("refusing to delete every image without confirmation")
                    .with_hint("pass --yes to confirm"));
            }
            if !confirm(&format!("Delete all {} images from {}?", count, path.display())) {
                eprintln!("Aborted");
                return Ok(());
            }
        }
        store.delete_all().map_err(CliError::store)?
    } else {
        // Check every ID first so a typo deletes nothing
        let known: Vec<ImageId> = store.list().map_err(CliError::store)?.iter().map(|i| i.id).collect();
        if let Some(&missing) = ids.iter().find(|id| !known.contains(id)) {
            return Err(CliError::store(StoreError::UnknownImage(missing)));
        }
        store.delete(&ids).map_err(CliError::store)?
    };

    println!("Deleted {} image{}", removed, if removed == 1 { "" } else { "s" });
    Ok(())
}

pub fn cmd_export(ctx: &Context, id: ImageId, output: Option<PathBuf>, db: Option<PathBuf>) -> Result<(), CliError> {
    let (store, _) = open_store(ctx, db)?;
    let record = store.load(id).map_err(CliError::store)?;

    match output {
        Some(path) => write_export(&record, &path),
        None => {
            let text = serde_json::to_string_pretty(&record).map_err(|e| CliError::io(e.to_string()))?;
            println!("{}", text);
            Ok(())
        }
    }
}

fn write_export(record: &hips_recon::ImageRecord, path: &Path) -> Result<(), CliError> {
    json::write_record(record, path)
        .map_err(|e| CliError::io(format!("failed to write {}: {}", path.display(), e)))?;
    eprintln!("Wrote {} to {}", record.image_name, path.display());
    Ok(())
}
