//! Configuration for schemas and the bundled adapters.
//!
//! Every configuration struct is built with `typed-builder`, so optional
//! knobs can be skipped:
//!
//! ```
//! use netabase_orm::config::SchemaConfig;
//!
//! let config = SchemaConfig::builder().batch_size(250).build();
//! assert!(config.lazy_connect);
//! assert_eq!(config.batch_size, 250);
//! ```

use std::path::PathBuf;
use typed_builder::TypedBuilder;

/// Engine-wide settings owned by a [`Schema`](crate::schema::Schema).
#[derive(Debug, Clone, TypedBuilder)]
#[builder(doc)]
pub struct SchemaConfig {
    /// Connect on first use instead of requiring an explicit `connect()`
    #[builder(default = true)]
    pub lazy_connect: bool,

    /// Page size used by `iterate` when the caller gives none
    #[builder(default = 1000)]
    pub batch_size: usize,

    /// Whether `save()` validates unless told otherwise
    #[builder(default = true)]
    pub validate_on_save: bool,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Configuration for the in-memory adapter.
///
/// ```
/// use netabase_orm::config::MemoryConfig;
///
/// let config = MemoryConfig::builder().initial_capacity(64).build();
/// assert_eq!(config.initial_capacity, 64);
/// ```
#[derive(Debug, Clone, TypedBuilder)]
#[builder(doc)]
pub struct MemoryConfig {
    /// Initial row capacity reserved per model table
    #[builder(default = 16)]
    pub initial_capacity: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Configuration for the sled adapter.
///
/// ```
/// use netabase_orm::config::SledConfig;
///
/// let config = SledConfig::builder()
///     .path("/data/orm.sled")
///     .cache_size_mb(128)
///     .flush_on_write(true)
///     .build();
/// assert!(!config.temporary);
/// ```
#[derive(Debug, Clone, TypedBuilder)]
#[builder(doc)]
pub struct SledConfig {
    /// Directory holding the sled database
    #[builder(setter(into))]
    pub path: PathBuf,

    /// Page cache size in megabytes
    #[builder(default = 64)]
    pub cache_size_mb: u64,

    /// Remove the database when it is dropped
    #[builder(default = false)]
    pub temporary: bool,

    /// Flush after every write instead of relying on sled's background flush
    #[builder(default = false)]
    pub flush_on_write: bool,
}

impl SledConfig {
    /// Create a basic configuration with just a path
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self::builder().path(path).build()
    }

    /// Configuration for a throwaway database under the system temp dir
    pub fn temp() -> Self {
        Self::builder()
            .path(std::env::temp_dir().join("netabase_orm"))
            .temporary(true)
            .build()
    }
}
