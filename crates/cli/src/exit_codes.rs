//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `hips` exit codes.
//! Exit codes are part of the shell contract: pipelines branch on them.
//!
//! # Exit Codes
//!
//! | Code | Domain    | Description                                        |
//! |------|-----------|----------------------------------------------------|
//! | 0    | Universal | Success (directory valid, command completed)       |
//! | 1    | validate  | Data directory is invalid                          |
//! | 2    | Universal | CLI usage error (bad args, no schema directory)    |
//! | 3    | schema    | Schema documents malformed or inconsistent         |
//! | 4    | io        | Filesystem error (schema dir, record output paths) |
//! | 5    | store     | Database error (open, ingest, duplicate image)     |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant below
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

// =============================================================================
// Universal
// =============================================================================

/// Success - command completed, directory valid.
pub const EXIT_SUCCESS: u8 = 0;

/// Validation ran to completion and the directory is invalid.
/// Also used by `ingest`, which refuses to load an invalid directory.
pub const EXIT_INVALID: u8 = 1;

/// Usage error - bad arguments, missing required options.
/// Matches clap's own exit code for argument errors.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Configuration
// =============================================================================

/// Schema directory could not be loaded, failed validation, or a
/// configuration error aborted a run part-way.
pub const EXIT_SCHEMA: u8 = 3;

// =============================================================================
// IO
// =============================================================================

/// Reading or writing a file outside the data directory failed.
pub const EXIT_IO: u8 = 4;

// =============================================================================
// Store
// =============================================================================

/// The SQLite store could not be opened or a store operation failed.
pub const EXIT_STORE: u8 = 5;
