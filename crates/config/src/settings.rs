// User settings (~/.config/hips/settings.json)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// When to colour terminal output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    /// Colour only when stderr is a terminal
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Schema
    #[serde(rename = "schema.dir")]
    pub schema_dir: Option<PathBuf>,  // None = must come from flag or HIPS_SCHEMA_DIR

    // Validation
    #[serde(rename = "validate.skipMissing")]
    pub skip_missing: bool,

    #[serde(rename = "validate.intfloatLint")]
    pub intfloat_lint: bool,

    // Output
    #[serde(rename = "output.color")]
    pub color: ColorChoice,

    // Store
    #[serde(rename = "store.path")]
    pub store_path: Option<PathBuf>,  // None = data dir default
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_dir: None,
            skip_missing: false,
            intfloat_lint: true,
            color: ColorChoice::Auto,
            store_path: None,
        }
    }
}

const DEFAULT_FILE: &str = r#"{
    // Directory holding common.json, meta_only.json, props_only.json and types.json
    // (overridden by --schema or HIPS_SCHEMA_DIR)
    "schema.dir": null,

    // Exclude nuclei with missing values instead of failing validation
    "validate.skipMissing": false,

    // Warn about float fields that only ever hold whole numbers
    "validate.intfloatLint": true,

    // "auto", "always" or "never"
    "output.color": "auto",

    // SQLite database used by ingest/list/delete (null = default location)
    "store.path": null
}
"#;

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hips");
        config_dir.join("settings.json")
    }

    /// Default database location when `store.path` is unset
    pub fn default_store_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hips")
            .join("hips.db")
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(Self::default_store_path)
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load from an explicit path. A missing file is created with defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            Self::create_default_file(path);
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    eprintln!("Error parsing settings.json: {}", e);
                    eprintln!("Using default settings");
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Error reading settings.json: {}", e);
                Self::default()
            }
        }
    }

    /// Parse settings JSON, ignoring lines starting with `//`
    pub fn parse(contents: &str) -> Result<Self, String> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        serde_json::from_str(&cleaned).map_err(|e| e.to_string())
    }

    /// Create default settings file with comments
    fn create_default_file(path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("Error creating config directory: {}", e);
                return;
            }
        }

        if let Err(e) = fs::write(path, DEFAULT_FILE) {
            eprintln!("Error writing default settings.json: {}", e);
        }
    }
}
