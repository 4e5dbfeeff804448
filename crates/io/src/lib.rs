// Persistence and export for validated image records

pub mod json;
pub mod store;

pub use store::{ImageId, ImageSummary, Store, StoreError};

/// Store schema version, kept in the `meta` table.
/// Increment when the fixed tables change in a way old versions can't read.
pub const STORE_FORMAT_VERSION: u32 = 1;
