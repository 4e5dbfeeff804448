use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostic;

// ---------------------------------------------------------------------------
// Datasets
// ---------------------------------------------------------------------------

/// One of the two paired CSV exports describing the same nuclei.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    /// Integer-space geometry and the truncated centroid.
    Meta,
    /// Sub-pixel geometry and the bulk of the measured features.
    Props,
}

impl Dataset {
    pub const ALL: [Dataset; 2] = [Dataset::Meta, Dataset::Props];

    /// Subdirectory of an image directory holding this dataset's CSV files.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Meta => "nucleiMeta",
            Self::Props => "nucleiProps",
        }
    }

    /// Capitalized name for the start of a message.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Meta => "Meta",
            Self::Props => "Props",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Meta => write!(f, "meta"),
            Self::Props => write!(f, "props"),
        }
    }
}

// ---------------------------------------------------------------------------
// Values + rows
// ---------------------------------------------------------------------------

/// A converted cell value.
///
/// `intfloat` fields convert to [`Value::Int`]; enum fields convert to
/// [`Value::Text`] once their value has been checked against the legal set.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(x) => serializer.serialize_f64(*x),
            Self::Text(s) => serializer.serialize_str(s),
        }
    }
}

// JSON has no NaN/Inf: serde_json writes them as `null`, so `null` reads back as NaN.
impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ValueVisitor;

        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integer, a number, a string or null")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
                Ok(Value::Int(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
                i64::try_from(v)
                    .map(Value::Int)
                    .map_err(|_| E::custom(format!("integer {v} out of range")))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
                Ok(Value::Float(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
                Ok(Value::Text(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
                Ok(Value::Text(v))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
                Ok(Value::Float(f64::NAN))
            }

            fn visit_none<E: de::Error>(self) -> Result<Value, E> {
                Ok(Value::Float(f64::NAN))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

/// One CSV record keyed by field name.
///
/// `None` means the cell was absent (raw rows) or conversion failed (typed rows).
#[derive(Debug, Clone, PartialEq)]
pub struct Row<T> {
    /// 1-based record number within the file, header excluded.
    pub record: usize,
    pub fields: BTreeMap<String, Option<T>>,
}

impl<T> Row<T> {
    pub fn new(record: usize) -> Self {
        Self {
            record,
            fields: BTreeMap::new(),
        }
    }

    /// The field's value, or `None` when absent or null.
    pub fn get(&self, field: &str) -> Option<&T> {
        self.fields.get(field).and_then(|v| v.as_ref())
    }

    /// Fields whose value is null, in field-name order.
    pub fn null_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| k.as_str())
    }
}

pub type RawRow = Row<String>;
pub type TypedRow = Row<Value>;

/// A meta row and its props counterpart, joined by object identity.
#[derive(Debug, Clone, PartialEq)]
pub struct PairedObject {
    pub identity: u64,
    pub meta: TypedRow,
    pub props: TypedRow,
}

// ---------------------------------------------------------------------------
// Output record
// ---------------------------------------------------------------------------

/// Flattened field name → value for one nucleus.
pub type NucleusRecord = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub name: String,
    pub left: u64,
    pub top: u64,
    pub right: u64,
    pub bottom: u64,
    pub nuclei: Vec<NucleusRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub image_name: String,
    pub regions: Vec<RegionRecord>,
}

// ---------------------------------------------------------------------------
// Run options + report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidateOptions {
    /// Exclude objects with null fields instead of failing the run.
    pub skip_missing: bool,
    /// Run the always-integral float field lint after each file.
    pub intfloat_lint: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            skip_missing: false,
            intfloat_lint: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Valid,
    Invalid,
    /// A configuration error stopped the run part-way.
    Aborted,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "valid"),
            Self::Invalid => write!(f, "invalid"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub files: usize,
    pub files_failed: usize,
    pub regions: usize,
    pub nuclei: usize,
    pub nuclei_skipped: usize,
    pub errors: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    pub image_name: String,
    pub data_dir: String,
    pub options: ValidateOptions,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub meta: ReportMeta,
    pub outcome: Outcome,
    pub summary: Summary,
    pub diagnostics: Vec<Diagnostic>,
    /// Present only when `outcome` is [`Outcome::Valid`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<ImageRecord>,
}

impl ValidationReport {
    /// True if any diagnostic message contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.diagnostics.iter().any(|d| d.message.contains(needle))
    }
}
