// SQLite store for validated image records
//
// Fixed tables hold images and regions; the nucleus table gains one column
// per catalogue entry the first time a schema with that column is ingested.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use hips_recon::{ImageRecord, NucleusColumn, NucleusRecord, RegionRecord, Value};

const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL      -- RFC 3339
);

CREATE TABLE IF NOT EXISTS rois (
    id INTEGER PRIMARY KEY,
    image_id INTEGER NOT NULL REFERENCES images(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    "left" INTEGER NOT NULL,
    top INTEGER NOT NULL,
    "right" INTEGER NOT NULL,
    bottom INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS nuclei (
    id INTEGER PRIMARY KEY,
    roi_id INTEGER NOT NULL REFERENCES rois(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_rois_image ON rois(image_id);
CREATE INDEX IF NOT EXISTS idx_nuclei_roi ON nuclei(roi_id);
"#;

/// Columns of `nuclei` that are not nucleus fields.
const FIXED_NUCLEUS_COLUMNS: [&str; 2] = ["id", "roi_id"];

pub type ImageId = i64;

#[derive(Debug)]
pub enum StoreError {
    Sqlite(String),
    /// An image with this name is already stored.
    DuplicateImage(String),
    UnknownImage(ImageId),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(msg) => write!(f, "database error: {msg}"),
            Self::DuplicateImage(name) => write!(f, "image '{name}' is already in the database"),
            Self::UnknownImage(id) => write!(f, "no image with ID {id}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSummary {
    pub id: ImageId,
    pub name: String,
    pub created_at: String,
    pub roi_count: usize,
    pub nucleus_count: usize,
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_sql(value: Option<&Value>) -> SqlValue {
    match value {
        None => SqlValue::Null,
        Some(Value::Int(i)) => SqlValue::Integer(*i),
        Some(Value::Float(x)) if x.is_nan() => SqlValue::Null,
        Some(Value::Float(x)) => SqlValue::Real(*x),
        Some(Value::Text(s)) => SqlValue::Text(s.clone()),
    }
}

fn from_sql(value: SqlValue) -> Option<Value> {
    match value {
        SqlValue::Integer(i) => Some(Value::Int(i)),
        SqlValue::Real(x) => Some(Value::Float(x)),
        SqlValue::Text(s) => Some(Value::Text(s)),
        SqlValue::Null | SqlValue::Blob(_) => None,
    }
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES ('format_version', ?1)",
            params![crate::STORE_FORMAT_VERSION.to_string()],
        )?;
        Ok(Self { conn })
    }

    /// Nucleus field columns currently present, in table order.
    pub fn nucleus_columns(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT name FROM pragma_table_info('nuclei')")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names
            .into_iter()
            .filter(|n| !FIXED_NUCLEUS_COLUMNS.contains(&n.as_str()))
            .collect())
    }

    /// Add any catalogue column the nucleus table does not have yet.
    fn ensure_columns(&self, columns: &[NucleusColumn]) -> Result<(), StoreError> {
        let existing: HashSet<String> = self.nucleus_columns()?.into_iter().collect();
        for column in columns {
            if existing.contains(&column.name) {
                continue;
            }
            self.conn.execute_batch(&format!(
                "ALTER TABLE nuclei ADD COLUMN {} {}",
                quote_ident(&column.name),
                column.storage.sql_type()
            ))?;
        }
        Ok(())
    }

    /// Insert a whole record in one transaction.
    pub fn ingest(&mut self, record: &ImageRecord, columns: &[NucleusColumn]) -> Result<ImageId, StoreError> {
        self.ensure_columns(columns)?;

        let tx = self.conn.transaction()?;

        let existing: Option<ImageId> = tx
            .query_row("SELECT id FROM images WHERE name = ?1", params![record.image_name], |row| {
                row.get(0)
            })
            .optional()?;
        if existing.is_some() {
            return Err(StoreError::DuplicateImage(record.image_name.clone()));
        }

        tx.execute(
            "INSERT INTO images (name, created_at) VALUES (?1, ?2)",
            params![record.image_name, chrono::Utc::now().to_rfc3339()],
        )?;
        let image_id = tx.last_insert_rowid();

        let column_list: Vec<String> = columns.iter().map(|c| quote_ident(&c.name)).collect();
        let placeholders: Vec<String> = (0..columns.len()).map(|i| format!("?{}", i + 2)).collect();
        let nucleus_sql = if columns.is_empty() {
            "INSERT INTO nuclei (roi_id) VALUES (?1)".to_string()
        } else {
            format!(
                "INSERT INTO nuclei (roi_id, {}) VALUES (?1, {})",
                column_list.join(", "),
                placeholders.join(", ")
            )
        };

        {
            let mut roi_stmt = tx.prepare(
                "INSERT INTO rois (image_id, name, \"left\", top, \"right\", bottom) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            let mut nucleus_stmt = tx.prepare(&nucleus_sql)?;

            for region in &record.regions {
                roi_stmt.execute(params![
                    image_id,
                    region.name,
                    region.left as i64,
                    region.top as i64,
                    region.right as i64,
                    region.bottom as i64,
                ])?;
                let roi_id = tx.last_insert_rowid();

                for nucleus in &region.nuclei {
                    let mut values = Vec::with_capacity(columns.len() + 1);
                    values.push(SqlValue::Integer(roi_id));
                    values.extend(columns.iter().map(|c| to_sql(nucleus.get(&c.name))));
                    nucleus_stmt.execute(params_from_iter(values.iter()))?;
                }
            }
        }

        tx.commit()?;
        Ok(image_id)
    }

    pub fn list(&self) -> Result<Vec<ImageSummary>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT i.id, i.name, i.created_at,
                    (SELECT COUNT(*) FROM rois r WHERE r.image_id = i.id),
                    (SELECT COUNT(*) FROM nuclei n JOIN rois r ON n.roi_id = r.id WHERE r.image_id = i.id)
             FROM images i ORDER BY i.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ImageSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: row.get(2)?,
                roi_count: row.get::<_, i64>(3)? as usize,
                nucleus_count: row.get::<_, i64>(4)? as usize,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Read a stored image back as a record. Null columns are left out of each nucleus.
    pub fn load(&self, id: ImageId) -> Result<ImageRecord, StoreError> {
        let image_name: String = self
            .conn
            .query_row("SELECT name FROM images WHERE id = ?1", params![id], |row| row.get(0))
            .optional()?
            .ok_or(StoreError::UnknownImage(id))?;

        let columns = self.nucleus_columns()?;
        let mut record = ImageRecord::new(image_name);

        let mut roi_stmt = self.conn.prepare(
            "SELECT id, name, \"left\", top, \"right\", bottom FROM rois WHERE image_id = ?1 ORDER BY id",
        )?;
        let regions = roi_stmt
            .query_map(params![id], |row| {
                let region = RegionRecord {
                    name: row.get(1)?,
                    left: row.get::<_, i64>(2)? as u64,
                    top: row.get::<_, i64>(3)? as u64,
                    right: row.get::<_, i64>(4)? as u64,
                    bottom: row.get::<_, i64>(5)? as u64,
                    nuclei: Vec::new(),
                };
                Ok((row.get::<_, i64>(0)?, region))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let select: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        let nucleus_sql = if select.is_empty() {
            "SELECT id FROM nuclei WHERE roi_id = ?1 ORDER BY id".to_string()
        } else {
            format!("SELECT {} FROM nuclei WHERE roi_id = ?1 ORDER BY id", select.join(", "))
        };
        let mut nucleus_stmt = self.conn.prepare(&nucleus_sql)?;

        for (roi_id, mut region) in regions {
            let nuclei = nucleus_stmt
                .query_map(params![roi_id], |row| {
                    let mut nucleus = NucleusRecord::new();
                    for (i, name) in columns.iter().enumerate() {
                        if let Some(value) = from_sql(row.get::<_, SqlValue>(i)?) {
                            nucleus.insert(name.clone(), value);
                        }
                    }
                    Ok(nucleus)
                })?
                .collect::<Result<Vec<_>, _>>()?;
            region.nuclei = nuclei;
            record.push_region(region);
        }

        Ok(record)
    }

    /// Delete the given images and everything under them. Returns the number removed.
    pub fn delete(&mut self, ids: &[ImageId]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        let mut removed = 0;
        for id in ids {
            removed += tx.execute("DELETE FROM images WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(removed)
    }

    pub fn delete_all(&mut self) -> Result<usize, StoreError> {
        Ok(self.conn.execute("DELETE FROM images", [])?)
    }
}
