//! Type converter: raw CSV strings to typed values, per the schema's type map.
//!
//! Each rule returns `Result<_, Failure>`. A failed value becomes null in the
//! typed row and is logged as a conversion diagnostic; the batch always runs
//! to the end. Only schema inconsistencies (a field without a type, an enum
//! field without legal values) stop conversion, as a [`HipsError`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::diagnostics::{DiagnosticPath, Diagnostics};
use crate::error::HipsError;
use crate::model::{Dataset, RawRow, Row, TypedRow, Value};
use crate::schema::{Schema, TypeTag};

/// Why a single value could not be converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// The cell was missing from the row.
    Absent,
    /// Not a number (or not a number of the expected shape).
    Invalid,
    /// A float literal with a fractional part where an integer was expected.
    NotIntegral,
    /// NaN or infinite where an integer was expected.
    NotFinite,
    /// Outside the signed 64-bit range.
    OutOfRange,
    /// Not one of the field's legal enum values.
    NotInEnum,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::Invalid => write!(f, "invalid"),
            Self::NotIntegral => write!(f, "not integral"),
            Self::NotFinite => write!(f, "not finite"),
            Self::OutOfRange => write!(f, "out of range"),
            Self::NotInEnum => write!(f, "not a legal value"),
        }
    }
}

// 2^63 as f64; every f64 in [-2^63, 2^63) fits in i64.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

// ---------------------------------------------------------------------------
// Single-value rules
// ---------------------------------------------------------------------------

/// Base-10 integer literal, surrounding whitespace allowed.
pub fn convert_int(raw: &str) -> Result<i64, Failure> {
    let trimmed = raw.trim();
    match trimmed.parse::<i64>() {
        Ok(v) => Ok(v),
        Err(_) => {
            // Digits only but too long for i64
            let digits = trimmed.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(trimmed);
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                Err(Failure::OutOfRange)
            } else {
                Err(Failure::Invalid)
            }
        }
    }
}

/// An integral quantity written as a float literal ("12.0", "1e3").
pub fn convert_intfloat(raw: &str) -> Result<i64, Failure> {
    let x: f64 = raw.trim().parse().map_err(|_| Failure::Invalid)?;
    if !x.is_finite() {
        return Err(Failure::NotFinite);
    }
    if x.fract() != 0.0 {
        return Err(Failure::NotIntegral);
    }
    if !(-I64_BOUND..I64_BOUND).contains(&x) {
        return Err(Failure::OutOfRange);
    }
    Ok(x as i64)
}

/// Floating point. The empty string is a legitimate "no value" (`Ok(None)`).
/// NaN and infinities are accepted.
pub fn convert_float(raw: &str) -> Result<Option<f64>, Failure> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.trim().parse::<f64>().map(Some).map_err(|_| Failure::Invalid)
}

pub fn convert_enum(raw: &str, legal: &BTreeSet<String>) -> Result<String, Failure> {
    if legal.contains(raw) {
        Ok(raw.to_string())
    } else {
        Err(Failure::NotInEnum)
    }
}

// ---------------------------------------------------------------------------
// Integrality observations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldObservation {
    /// Finite values seen.
    pub finite: usize,
    /// Finite values with a fractional part.
    pub fractional: usize,
}

/// Per-field record of the finite values seen in float-tagged fields of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FloatObservations {
    fields: BTreeMap<String, FieldObservation>,
}

impl FloatObservations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, field: &str, x: f64) {
        if !x.is_finite() {
            return;
        }
        let entry = self.fields.entry(field.to_string()).or_default();
        entry.finite += 1;
        if x.fract() != 0.0 {
            entry.fractional += 1;
        }
    }

    pub fn get(&self, field: &str) -> Option<FieldObservation> {
        self.fields.get(field).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FieldObservation)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

// ---------------------------------------------------------------------------
// Row conversion
// ---------------------------------------------------------------------------

fn describe(raw: &str, tag: TypeTag, failure: Failure) -> String {
    match failure {
        Failure::Absent => format!("Missing {tag} value"),
        Failure::Invalid => format!("Invalid {tag} value: {raw}"),
        Failure::NotIntegral | Failure::NotFinite => format!("Value {raw} is not a valid intfloat"),
        Failure::OutOfRange => format!("Value {raw} is out of range for {tag}"),
        Failure::NotInEnum => format!("Invalid enum value '{raw}'"),
    }
}

fn convert_cell(
    raw: &str,
    field: &str,
    tag: TypeTag,
    legal: Option<&BTreeSet<String>>,
    observations: &mut FloatObservations,
) -> Result<Option<Value>, Failure> {
    match tag {
        TypeTag::Int => convert_int(raw).map(|v| Some(Value::Int(v))),
        TypeTag::IntFloat => convert_intfloat(raw).map(|v| Some(Value::Int(v))),
        TypeTag::Float => {
            let value = convert_float(raw)?;
            if let Some(x) = value {
                observations.observe(field, x);
            }
            Ok(value.map(Value::Float))
        }
        TypeTag::String => Ok(Some(Value::Text(raw.to_string()))),
        TypeTag::Enum => {
            let legal = legal.ok_or(Failure::NotInEnum)?;
            convert_enum(raw, legal).map(|v| Some(Value::Text(v)))
        }
    }
}

/// Convert every field of every row using `dataset`'s type map.
///
/// Float observations for the integrality lint are added to `observations`.
pub fn convert_rows(
    rows: Vec<RawRow>,
    dataset: Dataset,
    schema: &Schema,
    diags: &mut Diagnostics,
    path: &DiagnosticPath,
    observations: &mut FloatObservations,
) -> Result<Vec<TypedRow>, HipsError> {
    let types = schema.types(dataset);
    let path = path.with_dataset(dataset);
    let mut typed_rows = Vec::with_capacity(rows.len());

    for row in rows {
        let mut typed = Row::new(row.record);
        for (field, raw) in row.fields {
            let tag = types.tag(&field).ok_or_else(|| HipsError::UntypedField {
                dataset,
                field: field.clone(),
            })?;
            let legal = types.legal_values(&field);
            if tag == TypeTag::Enum && legal.is_none() {
                return Err(HipsError::UnregisteredEnum { dataset, field });
            }

            let converted = match raw.as_deref() {
                Some(raw) => convert_cell(raw, &field, tag, legal, observations)
                    .map_err(|failure| describe(raw, tag, failure)),
                None if tag == TypeTag::String => Ok(None),
                None => Err(describe("", tag, Failure::Absent)),
            };

            let value = match converted {
                Ok(value) => value,
                Err(message) => {
                    diags.conversion(
                        &path.with_field(&field),
                        format!("{message} (field '{field}', record {})", row.record),
                    );
                    None
                }
            };
            typed.fields.insert(field, value);
        }
        typed_rows.push(typed);
    }

    Ok(typed_rows)
}
