//! Template discovery through the manager: memoization, snapshots, fingerprints.

use anyhow::Result;
use serial_test::serial;
use std::time::Duration;
use tplcache::config::Profile;
use tplcache::discovery::{CacheSource, SearchRoot, canonicalize, fingerprint};
use tplcache::test_utils::TestEnvironment;

fn site(profile: Profile) -> Result<TestEnvironment> {
    TestEnvironment::builder()?
        .with_template("home.html", "home")
        .with_template("about.html", "about")
        .with_template("emails/welcome.html", "welcome")
        .with_file("admin/dash.html", "dash")
        .with_file("admin/readme.txt", "not a template")
        .with_namespace("admin", "admin")
        .with_profile(profile)
        .build()
}

#[test]
fn test_repeated_listing_is_a_hit() -> Result<()> {
    let env = site(Profile::Full)?;
    let mut manager = env.manager();

    let first = manager.discovered_templates();
    assert_eq!(first, vec!["about", "emails/welcome", "home", "@admin/dash"]);
    let stats = manager.discovery_stats();
    assert_eq!((stats.hits, stats.misses), (0, 1));

    let second = manager.discovered_templates();
    assert_eq!(second, first);
    let stats = manager.discovery_stats();
    assert_eq!((stats.hits, stats.misses), (1, 1));
    assert_eq!(stats.cache_source, Some(CacheSource::Scan));
    Ok(())
}

#[test]
fn test_fingerprint_ignores_registration_order() -> Result<()> {
    let env = site(Profile::Full)?;
    let views = env.project_dir.join("views");
    let admin = env.project_dir.join("admin");

    let forward = canonicalize(&[SearchRoot::main(&views), SearchRoot::namespaced("admin", &admin)]);
    let reverse = canonicalize(&[
        SearchRoot::namespaced("admin", &admin),
        SearchRoot::main(&views),
        SearchRoot::main(&views),
    ]);
    assert_eq!(forward, reverse);
    assert_eq!(fingerprint::compute(&forward, 0), fingerprint::compute(&reverse, 0));
    assert_eq!(fingerprint::compute(&forward, 2), fingerprint::compute(&reverse, 2));
    Ok(())
}

#[test]
fn test_snapshot_reused_by_new_instance_until_roots_change() -> Result<()> {
    let env = site(Profile::Full)?;
    let names = env.manager().discovered_templates();
    assert!(env.file_exists("cache/discovery-stats-list.json"));

    let mut second = env.manager();
    assert_eq!(second.discovered_templates(), names);
    let stats = second.discovery_stats();
    assert_eq!(stats.cache_source, Some(CacheSource::PersistedPreload));
    assert_eq!(stats.misses, 1);

    // Directory timestamps can be coarse; make sure the next write lands in a new tick
    std::thread::sleep(Duration::from_millis(50));
    env.write_file("views/contact.html", "contact")?;

    let mut third = env.manager();
    let listed = third.discovered_templates();
    assert!(listed.contains(&"contact".to_string()));
    assert_eq!(third.discovery_stats().cache_source, Some(CacheSource::Scan));
    Ok(())
}

#[test]
#[serial]
fn test_shared_map_serves_new_instance() -> Result<()> {
    let env = site(Profile::Full)?;
    let names = env.manager().discovered_templates();
    std::fs::remove_file(env.cache_dir().join("discovery-stats-list.json"))?;

    let mut second = env.manager();
    assert_eq!(second.discovered_templates(), names);
    assert_eq!(second.discovery_stats().cache_source, Some(CacheSource::Shared));
    Ok(())
}

#[test]
fn test_lean_profile_persists_no_discovery_state() -> Result<()> {
    let env = site(Profile::Lean)?;
    let mut manager = env.manager();
    assert_eq!(manager.discovered_templates().len(), 4);
    assert!(!env.file_exists("cache/discovery-stats.json"));
    assert!(!env.file_exists("cache/discovery-stats-list.json"));

    let mut second = env.manager();
    second.discovered_templates();
    assert_eq!(second.discovery_stats().cache_source, Some(CacheSource::Scan));
    Ok(())
}

#[test]
fn test_add_path_extends_listing() -> Result<()> {
    let env = site(Profile::Full)?;
    env.write_file("extra/promo.html", "promo")?;
    let mut manager = env.manager();
    assert_eq!(manager.discovered_templates().len(), 4);

    manager.add_path(env.project_dir.join("extra"), None);
    let names = manager.discovered_templates();
    assert!(names.contains(&"promo".to_string()));
    assert_eq!(manager.discovery_stats().invalidations, 1);
    Ok(())
}

#[test]
fn test_listing_filters() -> Result<()> {
    let env = site(Profile::Full)?;
    let mut manager = env.manager();

    let admin = manager.list_templates(false, Some("@admin"), None);
    assert_eq!(admin.names(), vec!["@admin/dash"]);

    let emails = manager.list_templates(false, None, Some("EMAILS/*"));
    assert_eq!(emails.names(), vec!["emails/welcome"]);

    let glob = manager.list_templates(false, None, Some("?bout"));
    assert_eq!(glob.names(), vec!["about"]);
    Ok(())
}
