//! [`TemplateEngine`] backed by Tera.
//!
//! Templates are looked up across the search roots (first match wins within a
//! namespace), added to a single `Tera` instance under their full name, and written
//! to the artifact cache when one is configured. Tera has no serializable compiled
//! form, so the artifact is the validated source: a later engine reuses it whenever
//! it is not older than the file on disk, skipping the root lookup's file read.
//!
//! Escaping is selected before every render from the namespace of the rendered
//! template, so a per-namespace strategy covers its includes and parents too.

use super::dependencies::referenced_templates;
use super::{EscapeStrategy, NamespaceEscaping, TemplateEngine};
use crate::artifact::ArtifactCache;
use crate::core::{LogicalName, TplError};
use crate::discovery::SearchRoot;
use crate::registry::{DynFilter, DynFunction, RegistrationOptions};
use crate::utils::fs::modified_secs;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tera::{Context, Tera};

struct FunctionAdapter {
    function: DynFunction,
    safe: bool,
}

impl tera::Function for FunctionAdapter {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        (self.function)(args)
    }

    fn is_safe(&self) -> bool {
        self.safe
    }
}

struct FilterAdapter {
    filter: DynFilter,
    safe: bool,
}

impl tera::Filter for FilterAdapter {
    fn filter(&self, value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
        (self.filter)(value, args)
    }

    fn is_safe(&self) -> bool {
        self.safe
    }
}

/// Name suffixes Tera escapes by default.
const DEFAULT_ESCAPE_SUFFIXES: [&str; 3] = [".html", ".htm", ".xml"];

/// Matches every template name.
const ESCAPE_EVERYTHING: [&str; 1] = [""];

pub struct TeraEngine {
    tera: Tera,
    roots: Vec<SearchRoot>,
    cache: Option<Arc<dyn ArtifactCache>>,
    autoescape: bool,
    escaping: NamespaceEscaping,
    globals: Context,
    loaded: HashSet<String>,
    loading: HashSet<String>,
}

impl fmt::Debug for TeraEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TeraEngine")
            .field("roots", &self.roots)
            .field("cache", &self.cache)
            .field("escaping", &self.escaping)
            .field("loaded", &self.loaded.len())
            .finish()
    }
}

impl TeraEngine {
    /// Create an engine. With `autoescape`, `.html`, `.htm` and `.xml` templates
    /// HTML-escape every printed value that is not marked safe.
    pub fn new(roots: Vec<SearchRoot>, cache: Option<Arc<dyn ArtifactCache>>, autoescape: bool) -> Self {
        Self {
            tera: Tera::default(),
            roots,
            cache,
            autoescape,
            escaping: NamespaceEscaping::new(),
            globals: Context::new(),
            loaded: HashSet::new(),
            loading: HashSet::new(),
        }
    }

    pub fn artifact_cache(&self) -> Option<&Arc<dyn ArtifactCache>> {
        self.cache.as_ref()
    }

    /// Whether `template` is parsed in this engine.
    pub fn is_loaded(&self, template: &str) -> bool {
        self.loaded.contains(template)
    }

    /// Point Tera's escape suffixes at the rule for `template`; `None` is a string
    /// template, escaped whenever autoescape is on.
    fn select_escaping(&mut self, template: Option<&str>) {
        let strategy = template
            .and_then(|t| LogicalName::parse(t).namespace)
            .and_then(|ns| self.escaping.get(ns).copied());
        let suffixes = match (strategy, template) {
            (Some(EscapeStrategy::Html), _) => ESCAPE_EVERYTHING.to_vec(),
            (Some(EscapeStrategy::Disabled), _) => Vec::new(),
            (None, _) if !self.autoescape => Vec::new(),
            (None, None) => ESCAPE_EVERYTHING.to_vec(),
            (None, Some(_)) => DEFAULT_ESCAPE_SUFFIXES.to_vec(),
        };
        self.tera.autoescape_on(suffixes);
    }

    /// Globals overlaid with `data` (a JSON object or `null`).
    fn context(&self, data: &Value) -> tera::Result<Context> {
        let mut context = self.globals.clone();
        if !data.is_null() {
            context.extend(Context::from_value(data.clone())?);
        }
        Ok(context)
    }

    /// Load every template `source` references; a missing optional include is skipped.
    fn load_references(&mut self, owner: &str, source: &str) -> Result<(), TplError> {
        for reference in referenced_templates(source) {
            match self.load(&reference.name, false) {
                Ok(()) => {}
                Err(TplError::TemplateNotFound {
                    ..
                }) if !reference.kind.is_required() => {
                    tracing::debug!("{} includes missing template {}", owner, reference.name);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn resolve(&self, template: &str) -> Result<PathBuf, TplError> {
        let name = LogicalName::parse(template);
        let mut searched = Vec::new();

        if !name.path.is_empty() {
            for root in self.roots.iter().filter(|r| r.namespace.as_deref() == name.namespace) {
                let candidate = root.path.join(name.path);
                if candidate.is_file() {
                    return Ok(candidate);
                }
                searched.push(root.path.clone());
            }
        }

        Err(TplError::TemplateNotFound {
            name: template.to_string(),
            searched,
        })
    }

    /// Source of `template` and whether it came from the artifact cache.
    fn read_source(&self, template: &str, force: bool) -> Result<(String, bool), TplError> {
        let path = self.resolve(template)?;

        if !force && let Some(cache) = &self.cache {
            let key = cache.generate_key(template);
            let stored_at = cache.last_modified(&key);
            let fresh = stored_at > 0 && modified_secs(&path).is_some_and(|source_at| stored_at >= source_at);
            if fresh && let Some(code) = cache.load(&key) {
                tracing::debug!("Reusing cached artifact for {}", template);
                return Ok((code, true));
            }
        }

        let source = fs::read_to_string(&path).map_err(|e| TplError::Compile {
            template: template.to_string(),
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        Ok((source, false))
    }

    fn load(&mut self, template: &str, force: bool) -> Result<(), TplError> {
        if !force && self.loaded.contains(template) {
            return Ok(());
        }
        // Reference cycle: Tera reports it when the template is added
        if !self.loading.insert(template.to_string()) {
            return Ok(());
        }
        let result = self.load_uncached(template, force);
        self.loading.remove(template);
        result
    }

    fn load_uncached(&mut self, template: &str, force: bool) -> Result<(), TplError> {
        let (source, from_cache) = self.read_source(template, force)?;
        self.load_references(template, &source)?;

        self.tera.add_raw_template(template, &source).map_err(|e| TplError::Compile {
            template: template.to_string(),
            message: format_tera_error(&e),
        })?;
        self.loaded.insert(template.to_string());

        if !from_cache && let Some(cache) = &self.cache {
            let key = cache.generate_key(template);
            if let Err(e) = cache.store(&key, &source) {
                tracing::warn!("Could not store artifact for {}: {:#}", template, e);
            }
        }
        tracing::debug!("Compiled template {}", template);
        Ok(())
    }
}

impl TemplateEngine for TeraEngine {
    fn compile(&mut self, template: &str, force: bool) -> Result<(), TplError> {
        self.load(template, force)
    }

    fn render(&mut self, template: &str, context: &Value) -> Result<String, TplError> {
        self.compile(template, false)?;

        let render_error = |e: tera::Error| TplError::Render {
            template: template.to_string(),
            message: format_tera_error(&e),
        };
        let context = self.context(context).map_err(render_error)?;
        self.select_escaping(Some(template));
        self.tera.render(template, &context).map_err(render_error)
    }

    fn render_str(&mut self, source: &str, context: &Value) -> Result<String, TplError> {
        self.load_references(STRING_TEMPLATE, source)?;

        let render_error = |e: tera::Error| TplError::Render {
            template: STRING_TEMPLATE.to_string(),
            message: format_tera_error(&e),
        };
        let context = self.context(context).map_err(render_error)?;
        self.select_escaping(None);
        self.tera.render_str(source, &context).map_err(render_error)
    }

    fn add_search_root(&mut self, root: SearchRoot) {
        if !self.roots.contains(&root) {
            self.roots.push(root);
        }
    }

    fn search_roots(&self) -> &[SearchRoot] {
        &self.roots
    }

    fn add_function(&mut self, name: &str, function: DynFunction, options: RegistrationOptions) {
        self.tera.register_function(
            name,
            FunctionAdapter {
                function,
                safe: options.safe,
            },
        );
    }

    fn add_filter(&mut self, name: &str, filter: DynFilter, options: RegistrationOptions) {
        self.tera.register_filter(
            name,
            FilterAdapter {
                filter,
                safe: options.safe,
            },
        );
    }

    fn add_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name, &value);
    }

    fn set_namespace_escaping(&mut self, escaping: NamespaceEscaping) {
        self.escaping = escaping;
    }
}

/// Name reported for templates rendered from a string.
const STRING_TEMPLATE: &str = "<string>";

/// Flatten a Tera error and its source chain into one readable message.
fn format_tera_error(error: &tera::Error) -> String {
    use std::error::Error;

    let mut messages = vec![error.to_string()];
    let mut current: Option<&dyn Error> = error.source();
    while let Some(err) = current {
        let message = err.to_string();
        if !message.trim().is_empty() && !messages.contains(&message) {
            messages.push(message);
        }
        current = err.source();
    }
    messages.join("\n  → ")
}
