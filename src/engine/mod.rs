//! Template engine binding.
//!
//! The rest of the crate talks to the engine only through [`TemplateEngine`]: compile
//! a template by name, render it with JSON data, manage search roots and accept
//! dynamic callables. [`TeraEngine`] is the production implementation.
//!
//! Names passed to the engine include the extension (`home.html`,
//! `@admin/users/list.html`); logical names without extension are a concern of the
//! layers above.

pub mod dependencies;
pub mod tera_engine;

use crate::core::TplError;
use crate::discovery::SearchRoot;
use crate::registry::{DynFilter, DynFunction, RegistrationOptions};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub use tera_engine::TeraEngine;

/// Escaping applied to the templates of one namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscapeStrategy {
    /// HTML-escape every printed value not marked safe, whatever the template suffix
    Html,
    /// Print values as they are
    Disabled,
}

/// Escape strategies keyed by namespace (without `@`).
pub type NamespaceEscaping = BTreeMap<String, EscapeStrategy>;

/// What the manager needs from a template engine.
pub trait TemplateEngine: Send {
    /// Parse `template` (and the templates it statically references) so a render
    /// can run. With `force`, cached forms are ignored and the source is re-read.
    ///
    /// # Errors
    ///
    /// [`TplError::TemplateNotFound`] or [`TplError::Compile`].
    fn compile(&mut self, template: &str, force: bool) -> Result<(), TplError>;

    /// Render `template` with `context` (a JSON object or `null`). Compiles first when needed.
    ///
    /// # Errors
    ///
    /// Compile errors, or [`TplError::Render`] when evaluation fails.
    fn render(&mut self, template: &str, context: &Value) -> Result<String, TplError>;

    /// Render `source` as an anonymous template with `context`.
    ///
    /// # Errors
    ///
    /// [`TplError::Render`] for syntax or evaluation errors, or the compile error of a
    /// referenced template.
    fn render_str(&mut self, source: &str, context: &Value) -> Result<String, TplError>;

    fn add_search_root(&mut self, root: SearchRoot);

    /// Roots in lookup order.
    fn search_roots(&self) -> &[SearchRoot];

    fn add_function(&mut self, name: &str, function: DynFunction, options: RegistrationOptions);

    fn add_filter(&mut self, name: &str, filter: DynFilter, options: RegistrationOptions);

    /// Make `value` visible to every render as `name`.
    fn add_global(&mut self, name: &str, value: Value);

    /// Replace the per-namespace escape strategies.
    fn set_namespace_escaping(&mut self, escaping: NamespaceEscaping);
}
