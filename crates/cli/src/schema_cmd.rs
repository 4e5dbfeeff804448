//! `hips schema`: check the schema documents and print the output columns.

use std::path::PathBuf;

use clap::Subcommand;
use hips_recon::{NucleusColumn, StorageType};

use crate::{CliError, Context};

#[derive(Subcommand)]
pub enum SchemaCommands {
    /// Load the schema documents and report whether they are consistent
    #[command(after_help = "\
Examples:
  hips schema check --schema ./schema
  HIPS_SCHEMA_DIR=./schema hips schema check")]
    Check {
        /// Schema directory (common.json, meta_only.json, props_only.json, types.json)
        #[arg(long, env = "HIPS_SCHEMA_DIR")]
        schema: Option<PathBuf>,
    },

    /// Print the nucleus columns of the output record
    #[command(after_help = "\
Examples:
  hips schema columns --schema ./schema
  hips schema columns --schema ./schema --json")]
    Columns {
        /// Schema directory (common.json, meta_only.json, props_only.json, types.json)
        #[arg(long, env = "HIPS_SCHEMA_DIR")]
        schema: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn cmd_schema(ctx: &Context, cmd: SchemaCommands) -> Result<(), CliError> {
    match cmd {
        SchemaCommands::Check { schema } => cmd_schema_check(ctx, schema),
        SchemaCommands::Columns { schema, json } => cmd_schema_columns(ctx, schema, json),
    }
}

fn cmd_schema_check(ctx: &Context, schema_flag: Option<PathBuf>) -> Result<(), CliError> {
    let schema = ctx.load_schema(schema_flag)?;
    println!(
        "Schema OK: {} common, {} meta-only, {} props-only fields ({} output columns)",
        schema.common_fields.len(),
        schema.meta_only_fields.len(),
        schema.props_only_fields.len(),
        schema.nucleus_columns().len(),
    );
    Ok(())
}

fn storage_label(storage: &StorageType) -> String {
    match storage {
        StorageType::Integer => "integer".to_string(),
        StorageType::Real => "real".to_string(),
        StorageType::Text => "text".to_string(),
        StorageType::Choice { values, max_length } => {
            format!("choice({} values, max {})", values.len(), max_length)
        }
    }
}

fn format_columns(columns: &[NucleusColumn]) -> Vec<String> {
    let name_width = columns.iter().map(|c| c.name.len()).max().unwrap_or(0);
    columns
        .iter()
        .map(|c| {
            format!(
                "{:<name_width$}  {:<5}  {}  <- {}",
                c.name,
                c.dataset.to_string(),
                storage_label(&c.storage),
                c.source,
            )
        })
        .collect()
}

fn cmd_schema_columns(ctx: &Context, schema_flag: Option<PathBuf>, json_output: bool) -> Result<(), CliError> {
    let schema = ctx.load_schema(schema_flag)?;
    let columns = schema.nucleus_columns();

    if json_output {
        let text = serde_json::to_string_pretty(&columns).map_err(|e| CliError::io(e.to_string()))?;
        println!("{}", text);
    } else {
        for line in format_columns(&columns) {
            println!("{}", line);
        }
    }
    Ok(())
}
