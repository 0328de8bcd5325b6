//! Integration test suite for tplcache
//!
//! End-to-end tests driving [`TemplateManager`](tplcache::manager::TemplateManager)
//! across manager instances (standing in for separate processes) and the
//! `tplcache` binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: the binary, via `assert_cmd`
//! - **discovery**: listing, snapshots, fingerprints and the shared map
//! - **lifecycle**: warm-up, compile index, invalidation and cache clearing
//! - **registration**: late-bound functions and filters across engine resets
//! - **remote_backend**: key-value artifact cache and metadata keys

mod cli;
mod discovery;
mod lifecycle;
mod registration;
mod remote_backend;
