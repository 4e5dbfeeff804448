//! Schema registry: expected field sets and per-dataset type maps.
//!
//! A [`Schema`] is loaded once from four JSON documents and passed by
//! reference into every engine call. Several schemas can coexist in one
//! process.
//!
//! ```text
//! common.json      ["Identifier.ObjectCode", "Identifier.Xmin", ...]
//! meta_only.json   ["Classif.StandardClass", ...]
//! props_only.json  ["slide", "roiname", "Size.Area", ...]
//! types.json       {"meta": {"Identifier.Xmin": "int", ...},
//!                   "props": {"Identifier.Xmin": "intfloat", ...},
//!                   "enum_values": {"meta": {"Classif.StandardClass": [...]}}}
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::HipsError;
use crate::model::Dataset;

/// Field names the engine itself depends on.
pub mod fields {
    pub const OBJECT_CODE: &str = "Identifier.ObjectCode";
    pub const XMIN: &str = "Identifier.Xmin";
    pub const YMIN: &str = "Identifier.Ymin";
    pub const XMAX: &str = "Identifier.Xmax";
    pub const YMAX: &str = "Identifier.Ymax";
    pub const CENTROID_X: &str = "Identifier.CentroidX";
    pub const CENTROID_Y: &str = "Identifier.CentroidY";

    /// Props fields repeated by the enclosing image/region in the output.
    pub const SLIDE: &str = "slide";
    pub const ROI_NAME: &str = "roiname";

    /// Identity and geometry fields every schema must declare as common.
    pub const IDENTITY: [&str; 7] = [OBJECT_CODE, XMIN, YMIN, XMAX, YMAX, CENTROID_X, CENTROID_Y];

    /// Taken from the meta row when building a nucleus.
    pub const META_AUTHORITATIVE: [&str; 5] = [OBJECT_CODE, XMIN, YMIN, CENTROID_X, CENTROID_Y];

    /// Taken from the props row when building a nucleus.
    pub const PROPS_AUTHORITATIVE: [&str; 2] = [XMAX, YMAX];

    pub const DROPPED_PROPS: [&str; 2] = [SLIDE, ROI_NAME];
}

/// Output field name for a source field: structural dots become underscores.
pub fn flatten_field_name(name: &str) -> String {
    name.replace('.', "_")
}

// ---------------------------------------------------------------------------
// Type tags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Int,
    /// Integral quantity serialized upstream as a float literal.
    IntFloat,
    Float,
    String,
    Enum,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::IntFloat => write!(f, "intfloat"),
            Self::Float => write!(f, "float"),
            Self::String => write!(f, "string"),
            Self::Enum => write!(f, "enum"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetTypes {
    pub tags: HashMap<String, TypeTag>,
    pub enum_values: HashMap<String, BTreeSet<String>>,
}

impl DatasetTypes {
    pub fn tag(&self, field: &str) -> Option<TypeTag> {
        self.tags.get(field).copied()
    }

    pub fn legal_values(&self, field: &str) -> Option<&BTreeSet<String>> {
        self.enum_values.get(field)
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TypeDocument {
    meta: HashMap<String, TypeTag>,
    props: HashMap<String, TypeTag>,
    #[serde(default)]
    enum_values: EnumValuesDocument,
}

#[derive(Debug, Default, Deserialize)]
struct EnumValuesDocument {
    #[serde(default)]
    meta: HashMap<String, Vec<String>>,
    #[serde(default)]
    props: HashMap<String, Vec<String>>,
}

fn parse_field_set(document: &str, input: &str) -> Result<BTreeSet<String>, HipsError> {
    let names: Vec<String> = serde_json::from_str(input).map_err(|e| HipsError::SchemaParse {
        document: document.into(),
        message: e.to_string(),
    })?;
    Ok(names.into_iter().collect())
}

fn dataset_types(tags: HashMap<String, TypeTag>, enums: HashMap<String, Vec<String>>) -> DatasetTypes {
    DatasetTypes {
        tags,
        enum_values: enums
            .into_iter()
            .map(|(field, values)| (field, values.into_iter().collect()))
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Output column catalogue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageType {
    Integer,
    Real,
    Text,
    Choice { values: Vec<String>, max_length: usize },
}

impl StorageType {
    fn for_tag(tag: TypeTag, legal: Option<&BTreeSet<String>>) -> Self {
        match tag {
            TypeTag::Int | TypeTag::IntFloat => Self::Integer,
            TypeTag::Float => Self::Real,
            TypeTag::String => Self::Text,
            TypeTag::Enum => {
                let values: Vec<String> = legal.map(|v| v.iter().cloned().collect()).unwrap_or_default();
                let max_length = values.iter().map(|v| v.chars().count()).max().unwrap_or(0);
                Self::Choice { values, max_length }
            }
        }
    }

    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text | Self::Choice { .. } => "TEXT",
        }
    }
}

/// One column of the nucleus output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NucleusColumn {
    /// Field name as it appears in the CSV header.
    pub source: String,
    /// Flattened identifier used in the output record.
    pub name: String,
    /// Dataset the value is taken from.
    pub dataset: Dataset,
    pub storage: StorageType,
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub common_fields: BTreeSet<String>,
    pub meta_only_fields: BTreeSet<String>,
    pub props_only_fields: BTreeSet<String>,
    pub meta_types: DatasetTypes,
    pub props_types: DatasetTypes,
}

impl Schema {
    pub const COMMON_DOCUMENT: &'static str = "common.json";
    pub const META_ONLY_DOCUMENT: &'static str = "meta_only.json";
    pub const PROPS_ONLY_DOCUMENT: &'static str = "props_only.json";
    pub const TYPES_DOCUMENT: &'static str = "types.json";

    /// Load and validate the four schema documents from `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self, HipsError> {
        if !dir.is_dir() {
            return Err(HipsError::Io(format!("no schema directory at {}", dir.display())));
        }
        let read = |name: &str| -> Result<String, HipsError> {
            let path = dir.join(name);
            std::fs::read_to_string(&path)
                .map_err(|e| HipsError::Io(format!("cannot read {}: {e}", path.display())))
        };

        let common = read(Self::COMMON_DOCUMENT)?;
        let meta_only = read(Self::META_ONLY_DOCUMENT)?;
        let props_only = read(Self::PROPS_ONLY_DOCUMENT)?;
        let types = read(Self::TYPES_DOCUMENT)?;
        Self::from_json_documents(&common, &meta_only, &props_only, &types)
    }

    pub fn from_json_documents(
        common: &str,
        meta_only: &str,
        props_only: &str,
        types: &str,
    ) -> Result<Self, HipsError> {
        let type_doc: TypeDocument =
            serde_json::from_str(types).map_err(|e| HipsError::SchemaParse {
                document: Self::TYPES_DOCUMENT.into(),
                message: e.to_string(),
            })?;

        let schema = Schema {
            common_fields: parse_field_set(Self::COMMON_DOCUMENT, common)?,
            meta_only_fields: parse_field_set(Self::META_ONLY_DOCUMENT, meta_only)?,
            props_only_fields: parse_field_set(Self::PROPS_ONLY_DOCUMENT, props_only)?,
            meta_types: dataset_types(type_doc.meta, type_doc.enum_values.meta),
            props_types: dataset_types(type_doc.props, type_doc.enum_values.props),
        };
        schema.validate()?;
        Ok(schema)
    }

    pub fn validate(&self) -> Result<(), HipsError> {
        // The three field sets must be disjoint
        let overlaps = [
            ("common", &self.common_fields, "meta-only", &self.meta_only_fields),
            ("common", &self.common_fields, "props-only", &self.props_only_fields),
            ("meta-only", &self.meta_only_fields, "props-only", &self.props_only_fields),
        ];
        for (a_name, a, b_name, b) in overlaps {
            if let Some(field) = a.intersection(b).next() {
                return Err(HipsError::SchemaValidation(format!(
                    "field '{field}' is listed as both {a_name} and {b_name}"
                )));
            }
        }

        for field in fields::IDENTITY {
            if !self.common_fields.contains(field) {
                return Err(HipsError::SchemaValidation(format!(
                    "common fields must include '{field}'"
                )));
            }
        }

        for dataset in Dataset::ALL {
            let types = self.types(dataset);
            for field in self.expected_fields(dataset) {
                match types.tag(&field) {
                    None => {
                        return Err(HipsError::SchemaValidation(format!(
                            "field '{field}' has no entry in {dataset} types"
                        )))
                    }
                    Some(TypeTag::Enum) if types.legal_values(&field).is_none() => {
                        return Err(HipsError::UnregisteredEnum { dataset, field });
                    }
                    Some(_) => {}
                }
            }
        }

        // Flattened output names must stay unique
        let mut seen: BTreeMap<String, String> = BTreeMap::new();
        for column in self.nucleus_columns() {
            if let Some(previous) = seen.insert(column.name.clone(), column.source.clone()) {
                return Err(HipsError::SchemaValidation(format!(
                    "fields '{previous}' and '{}' both flatten to '{}'",
                    column.source, column.name
                )));
            }
        }

        Ok(())
    }

    pub fn types(&self, dataset: Dataset) -> &DatasetTypes {
        match dataset {
            Dataset::Meta => &self.meta_types,
            Dataset::Props => &self.props_types,
        }
    }

    pub fn only_fields(&self, dataset: Dataset) -> &BTreeSet<String> {
        match dataset {
            Dataset::Meta => &self.meta_only_fields,
            Dataset::Props => &self.props_only_fields,
        }
    }

    /// Exact header set a file of `dataset` must carry.
    pub fn expected_fields(&self, dataset: Dataset) -> BTreeSet<String> {
        self.common_fields
            .union(self.only_fields(dataset))
            .cloned()
            .collect()
    }

    /// Columns of a nucleus entry in output order: identity and geometry,
    /// then meta-only fields, then props-only fields.
    pub fn nucleus_columns(&self) -> Vec<NucleusColumn> {
        let column = |source: &str, dataset: Dataset| {
            let types = self.types(dataset);
            let storage = types
                .tag(source)
                .map(|tag| StorageType::for_tag(tag, types.legal_values(source)))
                .unwrap_or(StorageType::Text);
            NucleusColumn {
                source: source.to_string(),
                name: flatten_field_name(source),
                dataset,
                storage,
            }
        };

        let mut columns = Vec::new();
        for field in fields::IDENTITY {
            let dataset = if fields::PROPS_AUTHORITATIVE.contains(&field) {
                Dataset::Props
            } else {
                Dataset::Meta
            };
            columns.push(column(field, dataset));
        }
        for field in &self.meta_only_fields {
            columns.push(column(field, Dataset::Meta));
        }
        for field in &self.props_only_fields {
            if !fields::DROPPED_PROPS.contains(&field.as_str()) {
                columns.push(column(field, Dataset::Props));
            }
        }
        columns
    }

    /// Reverse of [`flatten_field_name`] for the fields of this schema.
    pub fn source_field(&self, flat: &str) -> Option<String> {
        self.nucleus_columns()
            .into_iter()
            .find(|c| c.name == flat)
            .map(|c| c.source)
    }
}
