//! Key-value artifact cache and metadata keys through an injected store.

use anyhow::Result;
use std::sync::Arc;
use tplcache::artifact::{ArtifactCache, KeyValueStore, MemoryStore, RemoteArtifactCache};
use tplcache::config::{CacheBackendKind, TemplatesConfig};
use tplcache::manager::TemplateManager;
use tplcache::persistence::Medium;
use tplcache::test_utils::TestEnvironment;

fn service_config(env: &TestEnvironment) -> TemplatesConfig {
    let mut config = env.config.clone();
    config.cache.backend = CacheBackendKind::Service;
    config.cache.prefix = "site:".to_string();
    config
}

fn site() -> Result<TestEnvironment> {
    TestEnvironment::builder()?
        .with_template("home.html", "home {{ n }}")
        .with_template("about.html", "about")
        .with_file("admin/dash.html", "dash")
        .with_namespace("admin", "admin")
        .build()
}

#[test]
fn test_clear_removes_entries_and_index_key() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let cache = RemoteArtifactCache::new(store.clone(), "tpl_", None);

    cache.store("tpl_k1", "code")?;
    assert_eq!(cache.load("tpl_k1").as_deref(), Some("code"));
    assert!(store.get("tpl___index")?.is_some());

    assert_eq!(cache.clear(), 1);
    assert_eq!(cache.load("tpl_k1"), None);
    assert!(store.get("tpl___index")?.is_none());
    assert!(store.is_empty());
    Ok(())
}

#[test]
fn test_manager_state_lives_in_store() -> Result<()> {
    let env = site()?;
    let store = Arc::new(MemoryStore::new());
    let mut manager = TemplateManager::with_store(service_config(&env), Some(store.clone()));
    assert_eq!(manager.persistence_medium(), Medium::Remote);
    assert_eq!(manager.cache_path(), None);

    let summary = manager.warmup_all(false);
    assert_eq!(summary.compiled, 3);

    let keys = store.keys();
    for slot in ["site_compile.index", "site_disc.stats", "site_disc.list", "site_warmup.summary", "site___index"] {
        assert!(keys.contains(&slot.to_string()), "missing {slot} in {keys:?}");
    }
    assert_eq!(keys.iter().filter(|k| k.len() > 40).count(), 3);
    assert!(!env.file_exists("cache/compile-index.json"));
    assert!(!env.file_exists("cache/warmup-summary.json"));
    Ok(())
}

#[test]
fn test_second_instance_sees_compiled_state() -> Result<()> {
    let env = site()?;
    let store = Arc::new(MemoryStore::new());
    TemplateManager::with_store(service_config(&env), Some(store.clone())).warmup(&["home", "about"], false);

    let mut second = TemplateManager::with_store(service_config(&env), Some(store.clone()));
    assert!(second.is_compiled("home"));
    assert_eq!(second.render("home", &serde_json::json!({"n": 2}))?, "home 2");
    assert_eq!(second.last_warmup().map(|r| r.summary.compiled), Some(2));

    assert_eq!(second.invalidate_template("home", false), 1);
    assert!(!second.is_compiled("home"));
    assert!(store.get("site_invalidations")?.is_some());

    let mut third = TemplateManager::with_store(service_config(&env), Some(store));
    let diag = third.diagnostics();
    assert_eq!(diag.cache.mode, "service");
    assert_eq!(diag.cache.prefix.as_deref(), Some("site_"));
    assert_eq!(diag.invalidations.map(|i| i.cumulative_removed), Some(1));
    Ok(())
}

#[test]
fn test_clear_cache_wipes_metadata_keys() -> Result<()> {
    let env = site()?;
    let store = Arc::new(MemoryStore::new());
    let mut manager = TemplateManager::with_store(service_config(&env), Some(store.clone()));
    manager.warmup_all(false);
    manager.invalidate_template("about", false);

    assert_eq!(manager.clear_cache(true), 2);
    assert!(store.is_empty(), "left behind: {:?}", store.keys());
    assert!(manager.last_warmup().is_none());
    assert!(!manager.is_compiled("home"));
    Ok(())
}

#[test]
fn test_namespace_invalidation_deletes_keys() -> Result<()> {
    let env = site()?;
    let store = Arc::new(MemoryStore::new());
    let mut manager = TemplateManager::with_store(service_config(&env), Some(store.clone()));
    manager.warmup_all(false);

    let summary = manager.invalidate_namespace(Some("admin"), false);
    assert_eq!(summary.removed, 1);
    assert_eq!(summary.templates.get("@admin/dash"), Some(&1));
    assert!(manager.is_compiled("home"));
    Ok(())
}
