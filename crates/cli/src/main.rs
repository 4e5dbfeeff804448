// HIPS CLI - validate nucleus exports and load them into a local store

mod exit_codes;
mod logger;
mod render;
mod schema_cmd;
mod store_cmd;
mod validate;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use hips_config::{ColorChoice, Settings};
use hips_recon::{HipsError, Schema, ValidateOptions};

use exit_codes::{EXIT_INVALID, EXIT_IO, EXIT_SCHEMA, EXIT_STORE, EXIT_SUCCESS, EXIT_USAGE};
use schema_cmd::SchemaCommands;

#[derive(Parser)]
#[command(name = "hips")]
#[command(about = "Validate and reconcile paired nucleus CSV exports (nucleiMeta/nucleiProps)")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Stream engine progress to stderr as it happens
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Colour diagnostics (default: settings.json, then auto)
    #[arg(long, global = true, value_enum)]
    color: Option<ColorArg>,

    /// Settings file to use instead of ~/.config/hips/settings.json
    #[arg(long, global = true, env = "HIPS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ColorArg {
    Auto,
    Always,
    Never,
}

impl From<ColorArg> for ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => ColorChoice::Auto,
            ColorArg::Always => ColorChoice::Always,
            ColorArg::Never => ColorChoice::Never,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Validate one image directory and report every problem found
    #[command(after_help = "\
Examples:
  hips validate /data/TCGA-A1-A0SK --schema ./schema
  hips validate /data/TCGA-A1-A0SK --json > report.json
  hips validate /data/TCGA-A1-A0SK --skip-missing --output record.json

Exit codes:
  0  directory valid
  1  directory invalid
  3  schema error (or a configuration error aborted the run)")]
    Validate {
        /// Image directory containing nucleiMeta/ and nucleiProps/
        dir: PathBuf,

        #[command(flatten)]
        run: RunArgs,

        /// Do not warn about float fields that only ever hold whole numbers
        #[arg(long)]
        no_intfloat_lint: bool,

        /// Print the full validation report as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write the image record as JSON (only when the directory is valid)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Suppress the diagnostic tree on stderr
        #[arg(long, short)]
        quiet: bool,
    },

    /// Validate an image directory and, if valid, load it into the store
    #[command(after_help = "\
Examples:
  hips ingest /data/TCGA-A1-A0SK
  hips ingest /data/TCGA-A1-A0SK --db ./hips.db --skip-missing")]
    Ingest {
        /// Image directory containing nucleiMeta/ and nucleiProps/
        dir: PathBuf,

        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        db: DbArgs,

        /// Suppress the diagnostic tree on stderr
        #[arg(long, short)]
        quiet: bool,
    },

    /// List images in the store
    List {
        #[command(flatten)]
        db: DbArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete images (and their regions and nuclei) from the store
    #[command(after_help = "\
Examples:
  hips delete 3
  hips delete 3 4 7
  hips delete --all --yes")]
    Delete {
        /// Image IDs as shown by `hips list`
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        ids: Vec<i64>,

        /// Delete every image in the store
        #[arg(long)]
        all: bool,

        /// Do not ask for confirmation with --all
        #[arg(long, short)]
        yes: bool,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Write a stored image back out as a JSON record
    #[command(after_help = "\
Examples:
  hips export 3
  hips export 3 --output TCGA-A1-A0SK.json")]
    Export {
        /// Image ID as shown by `hips list`
        id: i64,

        /// Output file (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Inspect the schema documents
    #[command(subcommand)]
    Schema(SchemaCommands),
}

/// Options shared by the commands that run a validation.
#[derive(clap::Args)]
struct RunArgs {
    /// Schema directory (common.json, meta_only.json, props_only.json, types.json)
    #[arg(long, env = "HIPS_SCHEMA_DIR")]
    schema: Option<PathBuf>,

    /// Exclude nuclei with missing values instead of failing validation
    #[arg(long)]
    skip_missing: bool,

    /// Fail on missing values even when settings enable skip-missing
    #[arg(long, conflicts_with = "skip_missing")]
    no_skip_missing: bool,
}

impl RunArgs {
    /// The skip-missing choice made on the command line, if any.
    fn skip_missing(&self) -> Option<bool> {
        if self.skip_missing {
            Some(true)
        } else if self.no_skip_missing {
            Some(false)
        } else {
            None
        }
    }
}

#[derive(clap::Args)]
struct DbArgs {
    /// SQLite database (default: settings.json "store.path", then the data directory)
    #[arg(long, env = "HIPS_DB")]
    db: Option<PathBuf>,
}

/// Settings merged with global flags, shared by every command.
pub struct Context {
    pub settings: Settings,
    pub verbose: bool,
    pub color: bool,
}

impl Context {
    fn new(cli: &Cli) -> Self {
        let settings = match &cli.config {
            Some(path) => Settings::load_from(path),
            None => Settings::load(),
        };
        let choice = cli.color.map(ColorChoice::from).unwrap_or(settings.color);
        let color = match choice {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => atty::is(atty::Stream::Stderr),
        };
        Self { settings, verbose: cli.verbose, color }
    }

    /// Load the schema from the flag/env value, falling back to settings.
    pub fn load_schema(&self, flag: Option<PathBuf>) -> Result<Schema, CliError> {
        let dir = flag.or_else(|| self.settings.schema_dir.clone()).ok_or_else(|| {
            CliError::usage("no schema directory given").with_hint(
                "pass --schema DIR, set HIPS_SCHEMA_DIR, or set \"schema.dir\" in settings.json",
            )
        })?;

        tracing::debug!("Loading schema from {}", dir.display());
        Schema::from_dir(&dir).map_err(|e| {
            let err = match e {
                HipsError::Io(_) => CliError::io(e.to_string()),
                _ => CliError::schema(e.to_string()),
            };
            err.with_hint(format!("schema directory: {}", dir.display()))
        })
    }

    /// Run options: command-line choices first, then settings.
    pub fn options(&self, skip_missing: Option<bool>, no_intfloat_lint: bool) -> ValidateOptions {
        ValidateOptions {
            skip_missing: skip_missing.unwrap_or(self.settings.skip_missing),
            intfloat_lint: !no_intfloat_lint && self.settings.intfloat_lint,
        }
    }

    pub fn store_path(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.unwrap_or_else(|| self.settings.store_path())
    }
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.verbose {
        logger::init();
    }
    let ctx = Context::new(&cli);

    let result = match cli.command {
        Commands::Validate { dir, run, no_intfloat_lint, json, output, quiet } => {
            let options = ctx.options(run.skip_missing(), no_intfloat_lint);
            validate::cmd_validate(&ctx, dir, run.schema, options, json, output, quiet)
        }
        Commands::Ingest { dir, run, db, quiet } => {
            let options = ctx.options(run.skip_missing(), false);
            validate::cmd_ingest(&ctx, dir, run.schema, options, db.db, quiet)
        }
        Commands::List { db, json } => store_cmd::cmd_list(&ctx, db.db, json),
        Commands::Delete { ids, all, yes, db } => store_cmd::cmd_delete(&ctx, ids, all, yes, db.db),
        Commands::Export { id, output, db } => store_cmd::cmd_export(&ctx, id, output, db.db),
        Commands::Schema(cmd) => schema_cmd::cmd_schema(&ctx, cmd),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self { code: EXIT_INVALID, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self { code: EXIT_SCHEMA, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn store(err: hips_io::StoreError) -> Self {
        let hint = match &err {
            hips_io::StoreError::DuplicateImage(_) => {
                Some("run `hips list` to find its ID and `hips delete ID` to replace it".to_string())
            }
            hips_io::StoreError::UnknownImage(_) => Some("run `hips list` to see stored images".to_string()),
            hips_io::StoreError::Sqlite(_) => None,
        };
        Self { code: EXIT_STORE, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
