// JSON export/import of image records

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use hips_recon::ImageRecord;

/// Write a record as pretty-printed JSON. Non-finite floats become `null`.
pub fn write_record(record: &ImageRecord, path: &Path) -> Result<(), String> {
    let file = File::create(path).map_err(|e| e.to_string())?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, record).map_err(|e| e.to_string())?;
    Ok(())
}

pub fn read_record(path: &Path) -> Result<ImageRecord, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(|e| format!("{}: {e}", path.display()))
}
