//! Global constants used throughout the tplcache codebase.
//!
//! File names, key suffixes and defaults for persisted state live here so the
//! filesystem and key-value layouts stay in one place.

/// Default template file extension appended to logical names.
pub const DEFAULT_EXTENSION: &str = ".html";

/// Default directory (relative to the configuration file) for compiled artifacts
/// and persisted metadata.
pub const DEFAULT_CACHE_DIR: &str = ".tplcache";

/// Default configuration file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "tplcache.toml";

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV: &str = "TPLCACHE_CONFIG";

/// Default key prefix for the key-value backend.
pub const DEFAULT_CACHE_PREFIX: &str = "tpl_";

/// Internal key for search roots that have no namespace.
pub const MAIN_NAMESPACE: &str = "__main__";

/// File extension of compiled artifacts written by the filesystem backend.
pub const ARTIFACT_FILE_EXTENSION: &str = "tplc";

/// Suffix appended to the prefix for the remote artifact index key.
pub const ARTIFACT_INDEX_SUFFIX: &str = "__index";

/// Key prefix for discovery lists in the process-wide shared cache.
pub const SHARED_LIST_KEY_PREFIX: &str = "tplcache.discovery.list.";

/// Maximum number of names listed per section in extended diagnostics.
pub const DIAGNOSTICS_NAME_LIMIT: usize = 50;

/// Schema version written into warm-up and invalidation state blobs.
pub const STATE_VERSION: u32 = 1;

/// Filesystem names and key suffixes of persisted metadata.
pub mod state_files {
    /// Discovery counters and fingerprint.
    pub const DISCOVERY_STATS_FILE: &str = "discovery-stats.json";
    /// Discovery fingerprint + name list snapshot.
    pub const DISCOVERY_LIST_FILE: &str = "discovery-stats-list.json";
    /// Compile-state index (name -> true).
    pub const COMPILE_INDEX_FILE: &str = "compile-index.json";
    /// Last warm-up summary.
    pub const WARMUP_SUMMARY_FILE: &str = "warmup-summary.json";
    /// Last invalidation + cumulative counter.
    pub const INVALIDATIONS_FILE: &str = "invalidations.json";

    pub const DISCOVERY_STATS_KEY: &str = "disc.stats";
    pub const DISCOVERY_LIST_KEY: &str = "disc.list";
    pub const COMPILE_INDEX_KEY: &str = "compile.index";
    pub const WARMUP_SUMMARY_KEY: &str = "warmup.summary";
    pub const INVALIDATIONS_KEY: &str = "invalidations";
}
