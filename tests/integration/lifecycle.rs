//! Warm-up, compile index, invalidation and cache clearing across manager instances.

use anyhow::Result;
use serde_json::json;
use tplcache::manager::InvalidationKind;
use tplcache::test_utils::{TestEnvironment, init_test_logging};
use walkdir::WalkDir;

fn site() -> Result<TestEnvironment> {
    TestEnvironment::builder()?
        .with_template("layout.html", "<body>{% block content %}{% endblock %}</body>")
        .with_template("home.html", "{% extends \"layout.html\" %}{% block content %}{{ title }}{% endblock %}")
        .with_template("emails/welcome.html", "Welcome {{ name }}")
        .with_template("emails/reset.html", "Reset {{ name }}")
        .with_file("admin/dash.html", "dash")
        .with_namespace("admin", "admin")
        .build()
}

fn artifact_count(env: &TestEnvironment) -> usize {
    WalkDir::new(env.cache_dir())
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "tplc"))
        .count()
}

#[test]
fn test_compile_index_survives_new_instance() -> Result<()> {
    init_test_logging(None);
    let env = site()?;

    let mut first = env.manager();
    assert!(!first.is_compiled("home"));
    let summary = first.warmup(&["home"], false);
    assert_eq!(summary.compiled, 1);
    assert!(env.file_exists("cache/compile-index.json"));

    let mut second = env.manager();
    assert!(second.is_compiled("home"));
    assert!(!second.is_compiled("emails/welcome"));
    Ok(())
}

#[test]
fn test_warmup_all_reports_partial_failure() -> Result<()> {
    let env = site()?;
    env.write_file("views/broken.html", "{% for %}")?;

    let mut manager = env.manager();
    let summary = manager.warmup_all(false);
    // layout is stored while compiling home, so its own turn is a skip
    assert_eq!(summary.compiled, 4);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.error_details.len(), 1);
    assert_eq!(summary.error_details[0].template, "broken");

    let again = manager.warmup_all(false);
    assert_eq!(again.compiled, 0);
    assert_eq!(again.skipped, 5);
    assert_eq!(again.errors, 1);
    Ok(())
}

#[test]
fn test_render_uses_warmed_artifacts() -> Result<()> {
    let env = site()?;
    env.manager().warmup_all(false);
    let stored = artifact_count(&env);
    assert!(stored >= 5);

    let mut manager = env.manager();
    let html = manager.render("home", &json!({"title": "<b>Hi</b>"}))?;
    assert_eq!(html, "<body>&lt;b&gt;Hi&lt;&#x2F;b&gt;</body>");
    assert_eq!(artifact_count(&env), stored);
    Ok(())
}

#[test]
fn test_invalidate_many_is_exact() -> Result<()> {
    let env = site()?;
    let mut manager = env.manager();
    manager.warmup_all(false);
    let before = artifact_count(&env);

    let summary = manager.invalidate_templates(&["emails/welcome", "emails/welcome", " ", "home"], false);
    assert_eq!(summary.removed, 2);
    assert_eq!(summary.deduplicated, 2);
    assert_eq!(summary.templates.get("home"), Some(&1));
    assert_eq!(artifact_count(&env), before - 2);

    assert!(!manager.is_compiled("home"));
    assert!(manager.is_compiled("emails/reset"));
    assert!(manager.is_compiled("@admin/dash"));

    let history = manager.diagnostics().invalidations.expect("full profile");
    assert_eq!(history.cumulative_removed, 2);
    assert_eq!(history.last.map(|r| r.kind), Some(InvalidationKind::Batch));
    Ok(())
}

#[test]
fn test_invalidate_missing_template_is_zero() -> Result<()> {
    let env = site()?;
    let mut manager = env.manager();
    assert_eq!(manager.invalidate_template("nope", true), 0);
    assert!(!env.file_exists("cache/invalidations.json"));
    Ok(())
}

#[test]
fn test_namespace_invalidation_scopes() -> Result<()> {
    let env = site()?;
    let mut manager = env.manager();
    manager.warmup_all(false);

    let summary = manager.invalidate_namespace(Some("admin"), false);
    assert_eq!(summary.removed, 1);
    assert!(!manager.is_compiled("@admin/dash"));
    assert!(manager.is_compiled("home"));

    let summary = manager.invalidate_namespace(None, true);
    assert_eq!(summary.removed, 4);
    assert!(summary.reinit);
    assert!(!manager.engine_ready());
    assert_eq!(artifact_count(&env), 0);
    Ok(())
}

#[test]
fn test_clear_cache_then_recompile() -> Result<()> {
    let env = site()?;
    let mut manager = env.manager();
    manager.warmup_all(false);

    let removed = manager.clear_cache(true);
    assert_eq!(removed, 5);
    assert_eq!(artifact_count(&env), 0);

    let mut fresh = env.manager();
    assert!(!fresh.is_compiled("home"));
    assert_eq!(fresh.warmup(&["home"], false).compiled, 1);
    Ok(())
}

#[test]
fn test_disabled_cache_writes_no_artifacts() -> Result<()> {
    let env = TestEnvironment::builder()?.with_template("home.html", "{{ x }}").without_cache().build()?;
    let mut manager = env.manager();
    assert!(!manager.is_cache_enabled());
    assert_eq!(manager.render("home", &json!({"x": 1}))?, "1");
    assert_eq!(manager.clear_cache(false), 0);
    assert_eq!(artifact_count(&env), 0);
    Ok(())
}
