//! tplcache - compiled-template lifecycle management for Tera
//!
//! tplcache wraps a [Tera](https://keats.github.io/tera/) engine with everything a
//! long-running service needs around it: template discovery across several search
//! roots and namespaces, a compiled-artifact cache on disk or in a key-value store,
//! warm-up, targeted invalidation, late-bound functions and filters, and a
//! diagnostics snapshot.
//!
//! # Architecture Overview
//!
//! - Templates are addressed by **logical names**: no extension, `/` separators,
//!   and `@namespace/` for roots registered under a namespace.
//! - Compiled output is stored as **artifacts** named after a hash of the template
//!   name, so invalidation needs no lookup table.
//! - A small **compile index** records which templates were compiled, shared across
//!   processes through the same storage as the artifacts.
//! - **Discovery** results are memoized in-process, optionally in a process-wide map
//!   and in a persisted snapshot, all keyed by a fingerprint of the search roots.
//!
//! # Core Modules
//!
//! ## Facade
//! - [`manager`] - [`TemplateManager`](manager::TemplateManager), the entry point
//! - [`cli`] - the `tplcache` command-line interface
//! - [`config`] - `tplcache.toml` loading and capability profiles
//!
//! ## Components
//! - [`artifact`] - artifact cache trait with filesystem and key-value backends
//! - [`index`] - compile-state index
//! - [`discovery`] - template enumeration, fingerprints and snapshots
//! - [`invalidation`] - hash-based artifact removal
//! - [`registry`] - dynamic function and filter registrations
//! - [`engine`] - template engine abstraction and the Tera binding
//! - [`persistence`] - metadata slots on disk or in the key-value store
//!
//! ## Supporting
//! - [`core`] - error types and name handling
//! - [`constants`] - defaults and state file names
//! - [`utils`] - filesystem helpers
//!
//! # Example
//!
//! ```rust,no_run
//! use tplcache::config::TemplatesConfig;
//! use tplcache::manager::TemplateManager;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = TemplatesConfig::load(std::path::Path::new("tplcache.toml"))?;
//! let mut manager = TemplateManager::new(config);
//! manager.warmup_all(false);
//! println!("{}", manager.render("home", &serde_json::json!({"title": "Hi"}))?);
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;

pub mod discovery;
pub mod engine;
pub mod index;
pub mod invalidation;
pub mod registry;

pub mod manager;
pub mod persistence;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
