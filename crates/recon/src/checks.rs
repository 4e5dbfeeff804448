//! Consistency checker for paired objects.
//!
//! Per object: completeness first, then the six cross-dataset relations.
//! Every violation is reported and evaluation continues with the next
//! relation and the next object.

use crate::diagnostics::{DiagnosticPath, Diagnostics, Severity};
use crate::model::{Dataset, PairedObject, TypedRow, ValidateOptions, Value};
use crate::schema::fields;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Consistent,
    Inconsistent,
    /// Excluded under skip-missing because of a null field.
    Skipped,
}

// ---------------------------------------------------------------------------
// Numeric comparison
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(Self::Int(*i)),
            Value::Float(x) => Some(Self::Float(*x)),
            Value::Text(_) => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(x) => x,
        }
    }

    fn minus_one(self) -> Option<Self> {
        match self {
            Self::Int(i) => i.checked_sub(1).map(Self::Int),
            Self::Float(x) => Some(Self::Float(x - 1.0)),
        }
    }

    fn floor(self) -> Self {
        match self {
            Self::Int(i) => Self::Int(i),
            Self::Float(x) => Self::Float(x.floor()),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            _ => self.as_f64() == other.as_f64(),
        }
    }
}

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Relation {
    /// `meta == props`
    Equal,
    /// `meta == props - 1`
    OffByOne,
    /// `meta == floor(props)`
    Floor,
}

struct Check {
    field: &'static str,
    relation: Relation,
    /// Short label used in messages for the bounding-box fields.
    label: &'static str,
}

const CHECKS: [Check; 6] = [
    Check { field: fields::XMIN, relation: Relation::Equal, label: "Xmin" },
    Check { field: fields::YMIN, relation: Relation::Equal, label: "Ymin" },
    Check { field: fields::XMAX, relation: Relation::OffByOne, label: "Xmax" },
    Check { field: fields::YMAX, relation: Relation::OffByOne, label: "Ymax" },
    Check { field: fields::CENTROID_X, relation: Relation::Floor, label: fields::CENTROID_X },
    Check { field: fields::CENTROID_Y, relation: Relation::Floor, label: fields::CENTROID_Y },
];

impl Check {
    fn holds(&self, meta: Number, props: Number) -> bool {
        match self.relation {
            Relation::Equal => meta == props,
            Relation::OffByOne => props.minus_one().is_some_and(|p| meta == p),
            Relation::Floor => meta == props.floor(),
        }
    }

    fn violation(&self, id: u64) -> String {
        let label = self.label;
        match self.relation {
            Relation::Equal => format!("meta[{id}][{label}] and props[{id}][{label}] do not match"),
            Relation::OffByOne => {
                format!("meta[{id}][{label}] and props[{id}][{label}] are not off by one")
            }
            Relation::Floor => format!("meta[{id}][{label}] is not the floor of props[{id}][{label}]"),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-object check
// ---------------------------------------------------------------------------

fn report_nulls(
    row: &TypedRow,
    dataset: Dataset,
    id: u64,
    options: &ValidateOptions,
    diags: &mut Diagnostics,
    path: &DiagnosticPath,
) -> bool {
    let mut any = false;
    for field in row.null_fields() {
        any = true;
        let at = path.with_dataset(dataset).with_field(field);
        if options.skip_missing {
            diags.skip(&at, format!("{dataset}[{id}][{field}] is missing (skipping this record)"));
        } else {
            diags.integrity(Severity::Error, &at, format!("{dataset}[{id}][{field}] is missing"));
        }
    }
    any
}

fn numeric(
    row: &TypedRow,
    dataset: Dataset,
    field: &str,
    id: u64,
    diags: &mut Diagnostics,
    path: &DiagnosticPath,
) -> Result<Option<Number>, ()> {
    match row.get(field) {
        None => Ok(None),
        Some(value) => match Number::of(value) {
            Some(n) => Ok(Some(n)),
            None => {
                diags.integrity(
                    Severity::Error,
                    &path.with_dataset(dataset).with_field(field),
                    format!("{dataset}[{id}][{field}] is not numeric"),
                );
                Err(())
            }
        },
    }
}

/// Check one paired object. `path` should already name the file.
pub fn check_pair(
    pair: &PairedObject,
    options: &ValidateOptions,
    diags: &mut Diagnostics,
    path: &DiagnosticPath,
) -> Verdict {
    let id = pair.identity;
    let path = path.with_identity(id);

    let meta_nulls = report_nulls(&pair.meta, Dataset::Meta, id, options, diags, &path);
    let props_nulls = report_nulls(&pair.props, Dataset::Props, id, options, diags, &path);
    let has_nulls = meta_nulls || props_nulls;
    if has_nulls && options.skip_missing {
        return Verdict::Skipped;
    }

    let mut consistent = !has_nulls;
    for check in &CHECKS {
        let meta = numeric(&pair.meta, Dataset::Meta, check.field, id, diags, &path);
        let props = numeric(&pair.props, Dataset::Props, check.field, id, diags, &path);
        match (meta, props) {
            (Ok(Some(m)), Ok(Some(p))) => {
                if !check.holds(m, p) {
                    diags.integrity(Severity::Warning, &path.with_field(check.field), check.violation(id));
                    consistent = false;
                }
            }
            // Null side already reported by the completeness pass
            (Ok(_), Ok(_)) => {}
            _ => consistent = false,
        }
    }

    if consistent {
        Verdict::Consistent
    } else {
        Verdict::Inconsistent
    }
}
