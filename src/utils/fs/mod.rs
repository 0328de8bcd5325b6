//! File system utilities for the cache directory and persisted metadata.
//!
//! Writes go through [`atomic_write`] so a concurrent reader in another process never
//! observes a half-written JSON blob; two writers racing on the same file simply
//! produce "last writer wins".

pub mod atomic;
pub mod dirs;
pub mod metadata;

pub use atomic::atomic_write;
pub use dirs::ensure_dir;
pub use metadata::{modified_nanos, modified_secs};
