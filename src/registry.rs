//! Runtime-registered template functions and filters.
//!
//! The engine is created lazily and thrown away whenever its structure changes (new
//! search root, cache toggle). Registrations must survive that, so they live here
//! rather than in the engine:
//!
//! - registering while an engine exists applies immediately ([`Registration::Applied`])
//! - registering without one queues it ([`Registration::Pending`])
//! - [`DynamicRegistry::apply_all`] replays every applied entry and drains the queue
//!   into a freshly built engine
//!
//! Unregistering purges both states, so a queued-then-unregistered callable never
//! reaches an engine.

use crate::core::TplError;
use crate::engine::TemplateEngine;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A template function: named arguments in, value out.
pub type DynFunction = Arc<dyn Fn(&HashMap<String, Value>) -> tera::Result<Value> + Send + Sync>;

/// A template filter: piped value and named arguments in, value out.
pub type DynFilter = Arc<dyn Fn(&Value, &HashMap<String, Value>) -> tera::Result<Value> + Send + Sync>;

/// Options accepted by dynamic registrations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationOptions {
    /// Output is already escaped and must not be autoescaped again
    pub safe: bool,
}

impl RegistrationOptions {
    /// Parse options given as JSON.
    ///
    /// Accepted shapes: `null` (defaults), a boolean (the safe flag),
    /// `{"is_safe": ["html", ...]}` or `{"safe": true}`.
    ///
    /// # Errors
    ///
    /// [`TplError::InvalidRegistrationOptions`] for any other shape.
    pub fn from_value(kind: &'static str, name: &str, value: &Value) -> Result<Self, TplError> {
        let invalid = |reason: &str| TplError::InvalidRegistrationOptions {
            kind,
            name: name.to_string(),
            reason: reason.to_string(),
        };

        match value {
            Value::Null => Ok(Self::default()),
            Value::Bool(safe) => Ok(Self {
                safe: *safe,
            }),
            Value::Object(map) => {
                let mut options = Self::default();
                if let Some(is_safe) = map.get("is_safe") {
                    let Value::Array(contexts) = is_safe else {
                        return Err(invalid("`is_safe` must be a list of contexts"));
                    };
                    for context in contexts {
                        match context.as_str() {
                            Some("html" | "all") => options.safe = true,
                            Some(_) => {}
                            None => return Err(invalid("`is_safe` entries must be strings")),
                        }
                    }
                }
                if let Some(safe) = map.get("safe") {
                    let Value::Bool(safe) = safe else {
                        return Err(invalid("`safe` must be a boolean"));
                    };
                    options.safe = *safe;
                }
                Ok(options)
            }
            other => Err(invalid(&format!("expected a boolean or an object, got {}", json_type(other)))),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One registration, either already in an engine or waiting for one.
#[derive(Clone)]
pub enum Registration<T> {
    Applied {
        name: String,
        callable: T,
        options: RegistrationOptions,
    },
    Pending {
        name: String,
        callable: T,
        options: RegistrationOptions,
    },
}

impl<T> Registration<T> {
    pub fn name(&self) -> &str {
        match self {
            Self::Applied {
                name,
                ..
            }
            | Self::Pending {
                name,
                ..
            } => name,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

impl<T> fmt::Debug for Registration<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_applied() { "Applied" } else { "Pending" };
        f.debug_tuple(state).field(&self.name()).finish()
    }
}

/// Active/pending counts for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StackCounts {
    pub active: usize,
    pub pending: usize,
}

/// Registrations of one kind. At most one applied entry per name; pending entries
/// keep their arrival order.
pub struct CallableStack<T> {
    entries: Vec<Registration<T>>,
}

impl<T> fmt::Debug for CallableStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.entries).finish()
    }
}

impl<T> Default for CallableStack<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Clone> CallableStack<T> {
    fn push_applied(&mut self, name: &str, callable: T, options: RegistrationOptions) {
        self.entries.retain(|e| !(e.is_applied() && e.name() == name));
        self.entries.push(Registration::Applied {
            name: name.to_string(),
            callable,
            options,
        });
    }

    fn push_pending(&mut self, name: &str, callable: T, options: RegistrationOptions) {
        self.entries.push(Registration::Pending {
            name: name.to_string(),
            callable,
            options,
        });
    }

    /// Re-apply every applied entry, then apply and promote pending entries in order.
    fn apply_all(&mut self, mut apply: impl FnMut(&str, T, RegistrationOptions)) {
        let (applied, pending): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.entries).into_iter().partition(Registration::is_applied);

        for entry in &applied {
            if let Registration::Applied {
                name,
                callable,
                options,
            } = entry
            {
                apply(name, callable.clone(), *options);
            }
        }
        self.entries = applied;

        for entry in pending {
            if let Registration::Pending {
                name,
                callable,
                options,
            } = entry
            {
                apply(&name, callable.clone(), options);
                self.push_applied(&name, callable, options);
            }
        }
    }

    /// Drop every entry named `name`. Returns whether anything was removed.
    fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.name() != name);
        self.entries.len() != before
    }

    pub fn is_applied(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.is_applied() && e.name() == name)
    }

    pub fn counts(&self) -> StackCounts {
        let active = self.entries.iter().filter(|e| e.is_applied()).count();
        StackCounts {
            active,
            pending: self.entries.len() - active,
        }
    }

    /// Applied and pending names, first occurrence order, no duplicates.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for entry in &self.entries {
            if !names.iter().any(|n| n == entry.name()) {
                names.push(entry.name().to_string());
            }
        }
        names
    }
}

/// Dynamic functions and filters.
#[derive(Debug, Default)]
pub struct DynamicRegistry {
    functions: CallableStack<DynFunction>,
    filters: CallableStack<DynFilter>,
}

impl DynamicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply to `engine` now if there is one, otherwise queue.
    pub fn register_function(
        &mut self,
        name: &str,
        function: DynFunction,
        options: RegistrationOptions,
        engine: Option<&mut dyn TemplateEngine>,
    ) {
        match engine {
            Some(engine) => {
                engine.add_function(name, Arc::clone(&function), options);
                self.functions.push_applied(name, function, options);
                tracing::info!("Registered template function {}", name);
            }
            None => {
                self.functions.push_pending(name, function, options);
                tracing::info!("Queued template function {}", name);
            }
        }
    }

    /// Apply to `engine` now if there is one, otherwise queue.
    pub fn register_filter(
        &mut self,
        name: &str,
        filter: DynFilter,
        options: RegistrationOptions,
        engine: Option<&mut dyn TemplateEngine>,
    ) {
        match engine {
            Some(engine) => {
                engine.add_filter(name, Arc::clone(&filter), options);
                self.filters.push_applied(name, filter, options);
                tracing::info!("Registered template filter {}", name);
            }
            None => {
                self.filters.push_pending(name, filter, options);
                tracing::info!("Queued template filter {}", name);
            }
        }
    }

    /// Replay applied registrations and drain pending ones into `engine`.
    ///
    /// Safe to call repeatedly; the last registration of a name wins.
    pub fn apply_all(&mut self, engine: &mut dyn TemplateEngine) {
        self.functions.apply_all(|name, function, options| engine.add_function(name, function, options));
        self.filters.apply_all(|name, filter, options| engine.add_filter(name, filter, options));
    }

    pub fn unregister_function(&mut self, name: &str) -> bool {
        let removed = self.functions.remove(name);
        if removed {
            tracing::info!("Unregistered template function {}", name);
        }
        removed
    }

    pub fn unregister_filter(&mut self, name: &str) -> bool {
        let removed = self.filters.remove(name);
        if removed {
            tracing::info!("Unregistered template filter {}", name);
        }
        removed
    }

    pub fn functions(&self) -> &CallableStack<DynFunction> {
        &self.functions
    }

    pub fn filters(&self) -> &CallableStack<DynFilter> {
        &self.filters
    }
}
