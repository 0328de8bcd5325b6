//! Compile-state index.
//!
//! Tracks which logical templates are known to have a compiled artifact so listing
//! and diagnostics never have to probe the artifact store. Presence means compiled;
//! absence means unknown. The persisted form is a JSON object `name -> true`.
//!
//! Loading is memoized per storage locator for the lifetime of the index value: once
//! a locator has been read (or written), later loads from it are no-ops even if
//! another process changed the blob in the meantime.

use crate::persistence::{PersistenceSink, Slot};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Default, Clone)]
pub struct CompileIndex {
    compiled: BTreeSet<String>,
    loaded: HashSet<String>,
    seeded: bool,
}

impl CompileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust `names` as compiled. A seeded index is authoritative: later loads are skipped.
    pub fn seed<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compiled.extend(names.into_iter().map(Into::into));
        self.seeded = true;
    }

    pub fn mark_compiled(&mut self, name: &str) {
        if !self.compiled.contains(name) {
            self.compiled.insert(name.to_string());
        }
    }

    /// Drop `name`. Returns whether it was present.
    pub fn forget(&mut self, name: &str) -> bool {
        self.compiled.remove(name)
    }

    pub fn is_compiled(&self, name: &str) -> bool {
        self.compiled.contains(name)
    }

    /// Compiled names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.compiled.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    /// Forget every entry. Memoization state is kept.
    pub fn clear(&mut self) {
        self.compiled.clear();
    }

    /// Whether `locator` has already been read or written by this index.
    pub fn is_loaded(&self, locator: &str) -> bool {
        self.seeded || self.loaded.contains(locator)
    }

    /// Merge the persisted index from `sink` unless already loaded.
    ///
    /// Only `true` (or `1`) values count as compiled; anything else is ignored.
    /// Returns whether storage was actually consulted.
    pub fn load_from(&mut self, sink: &PersistenceSink) -> bool {
        let locator = sink.locator(Slot::CompileIndex);
        if self.is_loaded(&locator) {
            return false;
        }

        if let Some(map) = sink.try_load::<serde_json::Map<String, Value>>(Slot::CompileIndex) {
            let before = self.compiled.len();
            for (name, value) in map {
                let compiled = match value {
                    Value::Bool(flag) => flag,
                    Value::Number(n) => n.as_u64() == Some(1),
                    _ => false,
                };
                if compiled {
                    self.compiled.insert(name);
                }
            }
            tracing::debug!(
                "Loaded {} compiled entries from {}",
                self.compiled.len() - before,
                locator
            );
        }

        self.loaded.insert(locator);
        true
    }

    /// Write the index to `sink`. A missing directory or unreachable backend is a no-op.
    pub fn persist(&mut self, sink: &PersistenceSink) -> bool {
        self.loaded.insert(sink.locator(Slot::CompileIndex));
        let map: BTreeMap<&str, bool> = self.compiled.iter().map(|n| (n.as_str(), true)).collect();
        sink.try_save(Slot::CompileIndex, &map)
    }
}
