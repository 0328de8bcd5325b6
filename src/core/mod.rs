//! Core types and error handling for tplcache.
//!
//! - [`error`] - [`TplError`], the CLI-facing [`ErrorContext`] and [`user_friendly_error`]
//! - [`naming`] - logical template names, namespaces and artifact hashes

pub mod error;
pub mod naming;

pub use error::{ErrorContext, TplError, user_friendly_error};
pub use naming::{LogicalName, artifact_hash, normalize_namespace};
