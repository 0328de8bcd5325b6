//! Template manager facade.
//!
//! [`TemplateManager`] composes the pieces of the crate behind one object:
//!
//! - a lazily created [`TemplateEngine`] (dropped and rebuilt on structural changes)
//! - the compiled-artifact cache ([`CacheSetting`]) and the metadata [`PersistenceSink`]
//! - [`TemplateDiscovery`], [`CompileIndex`], [`TemplateInvalidator`] and the
//!   [`DynamicRegistry`]
//! - render counters plus warm-up and invalidation history for diagnostics
//!
//! Rendering propagates engine errors. Everything else (listing, warm-up,
//! invalidation, cache maintenance) returns counts or summaries and never fails:
//! storage problems degrade to misses and zero counts.
//!
//! # Example
//!
//! ```rust,no_run
//! use tplcache::config::TemplatesConfig;
//! use tplcache::manager::TemplateManager;
//! use serde_json::json;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = TemplatesConfig::load_or_default(None, &std::env::current_dir()?)?;
//! let mut manager = TemplateManager::new(config);
//!
//! let summary = manager.warmup_all(false);
//! println!("compiled {} templates", summary.compiled);
//!
//! let html = manager.render("home", &json!({"title": "Welcome"}))?;
//! # let _ = html;
//! # Ok(())
//! # }
//! ```

mod diagnostics;
mod history;
mod listing;
mod warmup;

pub use diagnostics::{
    CacheDiagnostics, Diagnostics, DiscoveryDiagnostics, InvalidationDiagnostics, NameLists,
    PerformanceDiagnostics, WarmupDiagnostics,
};
pub use history::{
    InvalidationHistory, InvalidationKind, InvalidationRecord, WarmupError, WarmupRecord, WarmupSummary,
};
pub use listing::{NameFilter, TemplateListing, TemplateStatus};

use crate::artifact::{ArtifactCache, CacheSetting, KeyValueStore, RemoteArtifactCache, normalize_prefix};
use crate::config::{CacheBackendKind, Capabilities, TemplatesConfig};
use crate::core::{TplError, normalize_namespace};
use crate::discovery::{DiscoveryStats, SearchRoot, TemplateDiscovery, shared};
use crate::engine::{EscapeStrategy, NamespaceEscaping, TeraEngine, TemplateEngine};
use crate::index::CompileIndex;
use crate::invalidation::{InvalidationSummary, InvalidationTarget, TemplateInvalidator};
use crate::persistence::{Medium, PersistenceSink, Slot};
use crate::registry::{DynFilter, DynFunction, DynamicRegistry, RegistrationOptions};
use crate::utils::fs::ensure_dir;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Render counters.
#[derive(Debug, Clone, Default)]
struct RenderMetrics {
    renders: u64,
    total_time: Duration,
    last_view: Option<String>,
    environment_resets: u64,
}

impl RenderMetrics {
    fn record(&mut self, view: &str, elapsed: Duration) {
        self.renders += 1;
        self.total_time += elapsed;
        self.last_view = Some(view.to_string());
    }
}

/// Outcome of [`TemplateManager::reset_metrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    /// Locators (paths or keys) of metadata blobs that were deleted
    pub removed: Vec<String>,
    /// Compiled artifacts deleted (only with `include_cache`)
    pub cache_files_removed: usize,
    pub include_index: bool,
    pub include_cache: bool,
}

/// Facade over discovery, caching, warm-up, invalidation and rendering.
pub struct TemplateManager {
    config: TemplatesConfig,
    capabilities: Capabilities,
    roots: Vec<SearchRoot>,
    store: Option<Arc<dyn KeyValueStore>>,
    /// Normalized key prefix of the service backend
    prefix: String,
    cache: CacheSetting,
    artifacts: Option<Arc<dyn ArtifactCache>>,
    sink: PersistenceSink,
    engine: Option<Box<dyn TemplateEngine>>,
    discovery: TemplateDiscovery,
    index: CompileIndex,
    registry: DynamicRegistry,
    globals: BTreeMap<String, Value>,
    escaping: NamespaceEscaping,
    invalidator: TemplateInvalidator,
    metrics: RenderMetrics,
    last_warmup: Option<WarmupRecord>,
    invalidations: InvalidationHistory,
}

impl std::fmt::Debug for TemplateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateManager")
            .field("roots", &self.roots)
            .field("cache", &self.cache)
            .field("sink", &self.sink)
            .field("engine_ready", &self.engine.is_some())
            .field("compiled", &self.index.len())
            .finish()
    }
}

impl TemplateManager {
    /// Manager over the filesystem backend.
    ///
    /// A `service` backend in `config` needs a store; without one this falls back to
    /// the filesystem backend with a warning.
    pub fn new(config: TemplatesConfig) -> Self {
        Self::with_store(config, None)
    }

    /// Manager whose `service` backend (if configured) uses `store` for compiled
    /// artifacts and metadata.
    pub fn with_store(config: TemplatesConfig, store: Option<Arc<dyn KeyValueStore>>) -> Self {
        let capabilities = config.capabilities();
        let store = match (config.cache.backend, store) {
            (CacheBackendKind::Service, Some(store)) => Some(store),
            (CacheBackendKind::Service, None) => {
                tracing::warn!("Cache backend 'service' configured without a store, using the filesystem");
                None
            }
            (CacheBackendKind::Filesystem, _) => None,
        };
        let prefix = normalize_prefix(&config.cache.prefix);
        let ttl = config.cache.ttl();

        let sink = match &store {
            Some(store) => {
                let sink = PersistenceSink::remote(Arc::clone(store), &prefix, ttl);
                let migrated = sink.migrate_from_directory(
                    &config.cache.directory,
                    &[Slot::DiscoveryStats, Slot::DiscoveryList],
                );
                if migrated > 0 {
                    tracing::info!("Migrated {} discovery blob(s) to the cache service", migrated);
                }
                sink
            }
            None => PersistenceSink::filesystem(&config.cache.directory),
        };

        let cache = match (&store, config.cache.enabled) {
            (_, false) => CacheSetting::Disabled,
            (Some(store), true) => {
                CacheSetting::Custom(Arc::new(RemoteArtifactCache::new(Arc::clone(store), &prefix, ttl)))
            }
            (None, true) => CacheSetting::Directory(config.cache.directory.clone()),
        };

        let mut discovery = TemplateDiscovery::new(config.discovery_settings(&capabilities));
        let mut manager = Self {
            roots: config.search_roots(),
            invalidator: TemplateInvalidator::new(config.extension.clone()),
            artifacts: cache.build(),
            capabilities,
            store,
            prefix,
            cache,
            sink,
            engine: None,
            discovery: TemplateDiscovery::default(),
            index: CompileIndex::new(),
            registry: DynamicRegistry::new(),
            globals: BTreeMap::new(),
            escaping: NamespaceEscaping::new(),
            metrics: RenderMetrics::default(),
            last_warmup: None,
            invalidations: InvalidationHistory::default(),
            config,
        };

        manager.prepare_cache_dir();
        if manager.capabilities.discovery_snapshot {
            discovery.load_persisted(&manager.sink);
        }
        manager.discovery = discovery;
        manager.load_history();
        manager
    }

    pub fn config(&self) -> &TemplatesConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn extension(&self) -> &str {
        &self.config.extension
    }

    /// Search roots in lookup order.
    pub fn search_roots(&self) -> &[SearchRoot] {
        &self.roots
    }

    pub fn registry(&self) -> &DynamicRegistry {
        &self.registry
    }

    pub fn discovery_stats(&self) -> DiscoveryStats {
        self.discovery.stats()
    }

    /// Storage medium of persisted metadata.
    pub fn persistence_medium(&self) -> Medium {
        self.sink.medium()
    }

    /// Whether an engine instance currently exists.
    pub fn engine_ready(&self) -> bool {
        self.engine.is_some()
    }

    fn template_name(&self, logical: &str) -> String {
        format!("{logical}{}", self.config.extension)
    }

    fn prepare_cache_dir(&self) {
        if let CacheSetting::Directory(dir) = &self.cache
            && let Err(e) = ensure_dir(dir)
        {
            tracing::debug!("Cache directory unavailable: {:#}", e);
        }
    }

    fn load_history(&mut self) {
        if self.capabilities.warmup_summary && self.last_warmup.is_none() {
            self.last_warmup = self.sink.try_load(Slot::WarmupSummary);
        }
        if self.capabilities.invalidation_history
            && let Some(history) = InvalidationHistory::load(&self.sink)
        {
            self.invalidations = history;
        }
    }

    fn load_compile_index(&mut self) {
        self.index.load_from(&self.sink);
    }

    /// The engine, created on first use with every dynamic registration applied.
    fn engine(&mut self) -> &mut dyn TemplateEngine {
        let engine = self.engine.get_or_insert_with(|| {
            let mut engine: Box<dyn TemplateEngine> =
                Box::new(TeraEngine::new(self.roots.clone(), self.artifacts.clone(), self.config.autoescape));
            self.registry.apply_all(engine.as_mut());
            for (name, value) in &self.globals {
                engine.add_global(name, value.clone());
            }
            if !self.escaping.is_empty() {
                engine.set_namespace_escaping(self.escaping.clone());
            }
            tracing::debug!("Created template engine with {} search root(s)", self.roots.len());
            engine
        });
        engine.as_mut()
    }

    fn drop_engine(&mut self) {
        self.engine = None;
    }

    /// Drop the engine instance; the next consumer recreates it. Also invalidates
    /// the in-process discovery list.
    pub fn reset_engine(&mut self) {
        self.drop_engine();
        self.discovery.invalidate();
        self.metrics.environment_resets += 1;
        tracing::debug!("Template engine reset");
    }

    /// Render logical template `name` (without extension) with `data`.
    ///
    /// # Errors
    ///
    /// [`TplError::TemplateNotFound`], [`TplError::Compile`] or [`TplError::Render`].
    pub fn render(&mut self, name: &str, data: &Value) -> Result<String, TplError> {
        let start = Instant::now();
        let template = self.template_name(name);
        let output = self.engine().render(&template, data)?;
        self.metrics.record(&template, start.elapsed());
        Ok(output)
    }

    /// Render `source` as an anonymous template with `data`, globals and every
    /// dynamic registration.
    ///
    /// # Errors
    ///
    /// [`TplError::Render`], or the compile error of a template `source` references.
    pub fn render_str(&mut self, source: &str, data: &Value) -> Result<String, TplError> {
        self.engine().render_str(source, data)
    }

    /// Make `value` visible to every render as `name`, in this and every later engine.
    pub fn add_global(&mut self, name: &str, value: Value) {
        if let Some(engine) = self.engine.as_mut() {
            engine.add_global(name, value.clone());
        }
        self.globals.insert(name.to_string(), value);
    }

    pub fn globals(&self) -> &BTreeMap<String, Value> {
        &self.globals
    }

    /// Escape templates of `namespace` (with or without `@`) with `strategy`.
    pub fn set_autoescape_for_namespace(&mut self, namespace: &str, strategy: EscapeStrategy) {
        let namespace = namespace.trim_start_matches('@');
        self.escaping.insert(namespace.to_string(), strategy);
        self.apply_escaping();
        tracing::info!("Autoescape for namespace '{}' set to {:?}", namespace, strategy);
    }

    /// Return `namespace` to the default escaping rule. `false` when nothing was set.
    pub fn remove_autoescape_for_namespace(&mut self, namespace: &str) -> bool {
        let namespace = namespace.trim_start_matches('@');
        if self.escaping.remove(namespace).is_none() {
            return false;
        }
        self.apply_escaping();
        tracing::info!("Autoescape override for namespace '{}' removed", namespace);
        true
    }

    pub fn namespace_escaping(&self) -> &NamespaceEscaping {
        &self.escaping
    }

    fn apply_escaping(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.set_namespace_escaping(self.escaping.clone());
        }
    }

    /// Add a search root. A live engine picks it up immediately; discovery rescans.
    /// A root that is already registered is ignored.
    pub fn add_path(&mut self, dir: impl Into<PathBuf>, namespace: Option<&str>) {
        let dir = dir.into();
        let root = match namespace.and_then(normalize_namespace) {
            Some(ns) => SearchRoot::namespaced(ns, dir),
            None => SearchRoot::main(dir),
        };
        if self.roots.contains(&root) {
            tracing::debug!("Template path {} already registered", root);
            return;
        }
        tracing::info!("Added template path {}", root);
        if let Some(engine) = self.engine.as_mut() {
            engine.add_search_root(root.clone());
        }
        self.roots.push(root);
        self.discovery.invalidate();
    }

    /// Every discovered logical name (no extension, `@ns/` prefixed for namespaces).
    pub fn discovered_templates(&mut self) -> Vec<String> {
        let sink = self.capabilities.discovery_snapshot.then_some(&self.sink);
        self.discovery.list_all(&self.roots, &self.config.extension, sink)
    }

    /// Discovered templates filtered by `namespace` (with or without `@`) and `pattern`.
    pub fn list_templates(
        &mut self,
        with_status: bool,
        namespace: Option<&str>,
        pattern: Option<&str>,
    ) -> TemplateListing {
        let names = NameFilter::new(namespace, pattern).apply(&self.discovered_templates());
        if !with_status {
            return TemplateListing::Names(names);
        }
        self.load_compile_index();
        TemplateListing::WithStatus(
            names
                .into_iter()
                .map(|name| TemplateStatus {
                    compiled: self.index.is_compiled(&name),
                    name,
                })
                .collect(),
        )
    }

    /// Whether the compile index lists `logical` as compiled.
    pub fn is_compiled(&mut self, logical: &str) -> bool {
        self.load_compile_index();
        self.index.is_compiled(logical)
    }

    /// File path or key of the persisted compile index.
    pub fn compile_index_locator(&self) -> String {
        self.sink.locator(Slot::CompileIndex)
    }

    /// Register a dynamic template function. Options are `null`, a boolean (safe flag)
    /// or an object (`{"is_safe": ["html"]}`, `{"safe": true}`).
    ///
    /// # Errors
    ///
    /// [`TplError::InvalidRegistrationOptions`] for any other options shape.
    pub fn register_function(&mut self, name: &str, function: DynFunction, options: &Value) -> Result<(), TplError> {
        let options = RegistrationOptions::from_value("function", name, options)?;
        let engine: Option<&mut dyn TemplateEngine> = match self.engine.as_mut() {
            Some(engine) => Some(engine.as_mut()),
            None => None,
        };
        self.registry.register_function(name, function, options, engine);
        Ok(())
    }

    /// Register a dynamic template filter. Options as for [`register_function`](Self::register_function).
    ///
    /// # Errors
    ///
    /// [`TplError::InvalidRegistrationOptions`] for an invalid options shape.
    pub fn register_filter(&mut self, name: &str, filter: DynFilter, options: &Value) -> Result<(), TplError> {
        let options = RegistrationOptions::from_value("filter", name, options)?;
        let engine: Option<&mut dyn TemplateEngine> = match self.engine.as_mut() {
            Some(engine) => Some(engine.as_mut()),
            None => None,
        };
        self.registry.register_filter(name, filter, options, engine);
        Ok(())
    }

    /// Remove a dynamic function. The engine is rebuilt without it on next use.
    pub fn unregister_function(&mut self, name: &str) -> bool {
        let removed = self.registry.unregister_function(name);
        if removed {
            self.drop_engine();
        }
        removed
    }

    /// Remove a dynamic filter. The engine is rebuilt without it on next use.
    pub fn unregister_filter(&mut self, name: &str) -> bool {
        let removed = self.registry.unregister_filter(name);
        if removed {
            self.drop_engine();
        }
        removed
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.cache.is_enabled()
    }

    /// Artifact directory of the filesystem backend; `None` when caching is off or
    /// artifacts live in the cache service.
    pub fn cache_path(&self) -> Option<&Path> {
        match &self.cache {
            CacheSetting::Directory(dir) => Some(dir),
            _ => None,
        }
    }

    fn set_cache(&mut self, cache: CacheSetting) {
        self.artifacts = cache.build();
        self.cache = cache;
        self.drop_engine();
    }

    /// Turn artifact caching on, in `path` if given. Without a path a previously
    /// enabled cache is kept, otherwise the configured backend is used.
    ///
    /// On the filesystem backend, metadata follows the artifact directory.
    pub fn enable_cache(&mut self, path: Option<PathBuf>) {
        let cache = match (path, &self.store) {
            (Some(dir), _) => CacheSetting::Directory(dir),
            (None, _) if self.cache.is_enabled() => self.cache.clone(),
            (None, Some(store)) => CacheSetting::Custom(Arc::new(RemoteArtifactCache::new(
                Arc::clone(store),
                &self.prefix,
                self.config.cache.ttl(),
            ))),
            (None, None) => CacheSetting::Directory(self.config.cache.directory.clone()),
        };
        if let CacheSetting::Directory(dir) = &cache
            && self.sink.medium() == Medium::Filesystem
        {
            self.sink = PersistenceSink::filesystem(dir);
        }
        self.set_cache(cache);
        self.prepare_cache_dir();
        match self.cache_path() {
            Some(dir) => tracing::info!("Template cache enabled at {}", dir.display()),
            None => tracing::info!("Template cache enabled (service)"),
        }
    }

    /// Turn artifact caching off, clearing existing artifacts first if asked.
    pub fn disable_cache(&mut self, delete_existing: bool) {
        if delete_existing {
            self.clear_cache(false);
        }
        self.set_cache(CacheSetting::Disabled);
        tracing::info!("Template cache disabled");
    }

    /// Delete every compiled artifact and forget the compile index.
    ///
    /// On the service backend every metadata key and the in-memory history go too.
    /// Returns the number of artifacts removed.
    pub fn clear_cache(&mut self, reinit: bool) -> usize {
        let removed = self.artifacts.as_ref().map_or(0, |cache| cache.clear());
        self.index.clear();

        match self.sink.medium() {
            Medium::Remote => {
                for slot in Slot::ALL {
                    self.sink.try_remove(slot);
                }
                self.last_warmup = None;
                self.invalidations = InvalidationHistory::default();
                self.discovery.invalidate();
            }
            Medium::Filesystem => {
                self.index.persist(&self.sink);
            }
        }

        if reinit {
            self.reset_engine();
        }
        tracing::info!("Template cache cleared ({} artifact(s) removed, reinit: {})", removed, reinit);
        removed
    }

    fn record_invalidation(&mut self, kind: InvalidationKind, removed: usize, reinit: bool) {
        if removed == 0 {
            return;
        }
        self.index.persist(&self.sink);
        self.invalidations.record(kind, removed, reinit);
        if self.capabilities.invalidation_history {
            self.invalidations.save(&self.sink);
        }
        if reinit {
            self.reset_engine();
        }
    }

    /// Remove the compiled artifacts of one logical template. Returns how many were removed.
    pub fn invalidate_template(&mut self, name: &str, reinit: bool) -> usize {
        self.load_compile_index();
        let removed = self.invalidator.invalidate_one(name.trim(), target(&self.cache), &mut self.index);
        self.record_invalidation(InvalidationKind::Single, removed, reinit);
        removed
    }

    /// Remove the compiled artifacts of several logical templates in one pass.
    pub fn invalidate_templates<S: AsRef<str>>(&mut self, names: &[S], reinit: bool) -> InvalidationSummary {
        self.load_compile_index();
        let summary = self.invalidator.invalidate_many(names, target(&self.cache), reinit, &mut self.index);
        self.record_invalidation(InvalidationKind::Batch, summary.removed, summary.reinit);
        summary
    }

    /// Remove the compiled artifacts of every discovered template in `namespace`
    /// (`None` = the main namespace).
    pub fn invalidate_namespace(&mut self, namespace: Option<&str>, reinit: bool) -> InvalidationSummary {
        let discovered = self.discovered_templates();
        self.load_compile_index();
        let summary = self.invalidator.invalidate_namespace(
            namespace,
            &discovered,
            target(&self.cache),
            reinit,
            &mut self.index,
        );
        self.record_invalidation(InvalidationKind::Namespace, summary.removed, summary.reinit);
        summary
    }

    /// Delete persisted discovery stats, list snapshot and warm-up summary, and
    /// optionally the compile index and compiled artifacts. In-process counters are
    /// reset as well.
    pub fn reset_metrics(&mut self, include_index: bool, include_cache: bool) -> ResetReport {
        let mut report = ResetReport {
            include_index,
            include_cache,
            ..ResetReport::default()
        };

        let mut slots = vec![Slot::DiscoveryStats, Slot::WarmupSummary, Slot::DiscoveryList];
        if include_index {
            slots.push(Slot::CompileIndex);
            self.index.clear();
        }
        for slot in slots {
            if self.sink.try_remove(slot) {
                report.removed.push(self.sink.locator(slot));
            }
        }

        if include_cache {
            report.cache_files_removed = self.artifacts.as_ref().map_or(0, |cache| cache.clear());
        }

        self.discovery.reset();
        shared::clear();
        self.last_warmup = None;
        tracing::info!(
            "Metrics reset ({} blob(s) removed, {} artifact(s) removed)",
            report.removed.len(),
            report.cache_files_removed
        );
        report
    }
}

fn target(cache: &CacheSetting) -> InvalidationTarget<'_> {
    match cache {
        CacheSetting::Directory(dir) => InvalidationTarget::Directory(dir),
        CacheSetting::Custom(cache) => InvalidationTarget::Artifacts(cache.as_ref()),
        CacheSetting::Disabled => InvalidationTarget::Unavailable,
    }
}
