//! Filesystem utilities and helpers
//!
//! # Modules
//!
//! - [`fs`] - Atomic writes, directory helpers and modification times
//!
//! # Example
//!
//! ```rust,no_run
//! use tplcache::utils::{ensure_dir, atomic_write};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! ensure_dir(Path::new(".tplcache"))?;
//! atomic_write(Path::new(".tplcache/compile-index.json"), b"{}")?;
//! # Ok(())
//! # }
//! ```

pub mod fs;

pub use fs::{atomic_write, ensure_dir, modified_nanos, modified_secs};
