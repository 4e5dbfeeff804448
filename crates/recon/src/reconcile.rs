//! Object reconciler: index rows by `ObjectCode` and pair meta with props.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{PairedObject, TypedRow, Value};
use crate::schema::fields;

/// Read an `ObjectCode` value as a non-negative integer, truncating floats.
pub fn identity_of(value: Option<&Value>) -> Option<u64> {
    let x = match value? {
        Value::Int(i) => return u64::try_from(*i).ok(),
        Value::Float(x) => *x,
        Value::Text(s) => s.trim().parse::<f64>().ok()?,
    };
    if !x.is_finite() {
        return None;
    }
    let truncated = x.trunc();
    if truncated < 0.0 || truncated >= u64::MAX as f64 {
        return None;
    }
    Some(truncated as u64)
}

pub type IdentityIndex = BTreeMap<u64, TypedRow>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateIdentity {
    pub identity: u64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// At least one identity appears on more than one row.
    Duplicates(Vec<DuplicateIdentity>),
    /// A row's `ObjectCode` is null or not a non-negative integer.
    Unreadable { record: usize, value: Option<String> },
}

/// Build an identity → row mapping. Any collision fails the whole file.
pub fn index_by_identity(rows: Vec<TypedRow>) -> Result<IdentityIndex, IdentityError> {
    let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
    let mut keyed = Vec::with_capacity(rows.len());

    for row in rows {
        let value = row.get(fields::OBJECT_CODE);
        let Some(identity) = identity_of(value) else {
            return Err(IdentityError::Unreadable {
                record: row.record,
                value: value.map(|v| v.to_string()),
            });
        };
        *counts.entry(identity).or_default() += 1;
        keyed.push((identity, row));
    }

    let duplicates: Vec<DuplicateIdentity> = counts
        .into_iter()
        .filter(|&(_, count)| count > 1)
        .map(|(identity, count)| DuplicateIdentity { identity, count })
        .collect();
    if !duplicates.is_empty() {
        return Err(IdentityError::Duplicates(duplicates));
    }

    Ok(keyed.into_iter().collect())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityMismatch {
    pub meta_only: Vec<u64>,
    pub props_only: Vec<u64>,
}

/// Join the two indexes. The key sets must be identical.
pub fn pair_objects(
    meta: IdentityIndex,
    mut props: IdentityIndex,
) -> Result<Vec<PairedObject>, IdentityMismatch> {
    let meta_keys: BTreeSet<u64> = meta.keys().copied().collect();
    let props_keys: BTreeSet<u64> = props.keys().copied().collect();
    if meta_keys != props_keys {
        return Err(IdentityMismatch {
            meta_only: meta_keys.difference(&props_keys).copied().collect(),
            props_only: props_keys.difference(&meta_keys).copied().collect(),
        });
    }

    let mut pairs = Vec::with_capacity(meta.len());
    for (identity, meta_row) in meta {
        if let Some(props_row) = props.remove(&identity) {
            pairs.push(PairedObject {
                identity,
                meta: meta_row,
                props: props_row,
            });
        }
    }
    Ok(pairs)
}
