//! The `tplcache` binary, one process per invocation.

use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tplcache::test_utils::TestEnvironment;

fn project() -> Result<TestEnvironment> {
    let env = TestEnvironment::builder()?
        .with_template("home.html", "<h1>{{ title }}</h1>")
        .with_template("emails/welcome.html", "Welcome {{ name }}")
        .with_file("admin/dash.html", "dash")
        .with_namespace("admin", "admin")
        .build()?;
    env.write_config()?;
    Ok(env)
}

fn tplcache(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tplcache").expect("binary is built");
    cmd.current_dir(dir).env("NO_COLOR", "1").env_remove("TPLCACHE_CONFIG").env_remove("RUST_LOG");
    cmd
}

fn json_output(cmd: &mut Command) -> Result<Value> {
    let output = cmd.assert().success().get_output().stdout.clone();
    Ok(serde_json::from_slice(&output)?)
}

#[test]
fn test_list_prints_logical_names() -> Result<()> {
    let env = project()?;
    tplcache(&env.project_dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("emails/welcome"))
        .stdout(predicate::str::contains("@admin/dash"))
        .stdout(predicate::str::contains("3 templates"));
    Ok(())
}

#[test]
fn test_warmup_is_visible_to_the_next_process() -> Result<()> {
    let env = project()?;
    let summary = json_output(tplcache(&env.project_dir).args(["warmup", "--all", "--json"]))?;
    assert_eq!(summary["compiled"], 3);
    assert_eq!(summary["errors"], 0);

    let listing = json_output(tplcache(&env.project_dir).args(["list", "--status", "--json"]))?;
    let entries = listing.as_array().expect("status listing is an array");
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e["compiled"] == true));

    let again = json_output(tplcache(&env.project_dir).args(["warmup", "home", "--json"]))?;
    assert_eq!(again["skipped"], 1);
    Ok(())
}

#[test]
fn test_invalidate_and_clear_cache() -> Result<()> {
    let env = project()?;
    tplcache(&env.project_dir).args(["warmup", "--all"]).assert().success();

    let summary = json_output(tplcache(&env.project_dir).args(["invalidate", "home", "home", "--json"]))?;
    assert_eq!(summary["removed"], 1);
    assert_eq!(summary["deduplicated"], 1);

    let summary = json_output(tplcache(&env.project_dir).args(["invalidate-namespace", "@admin", "--json"]))?;
    assert_eq!(summary["templates"]["@admin/dash"], 1);

    tplcache(&env.project_dir)
        .arg("clear-cache")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared 1 artifact"));
    Ok(())
}

#[test]
fn test_render_with_data() -> Result<()> {
    let env = project()?;
    tplcache(&env.project_dir)
        .args(["render", "home", "--data", r#"{"title": "Tom & Jerry"}"#])
        .assert()
        .success()
        .stdout("<h1>Tom &amp; Jerry</h1>\n");
    Ok(())
}

#[test]
fn test_render_missing_template_fails() -> Result<()> {
    let env = project()?;
    tplcache(&env.project_dir)
        .args(["render", "missing"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not found"))
        .stderr(predicate::str::contains("suggestion"));
    Ok(())
}

#[test]
fn test_diagnostics_json_sections() -> Result<()> {
    let env = project()?;
    tplcache(&env.project_dir).args(["warmup", "--all"]).assert().success();

    let diag = json_output(tplcache(&env.project_dir).args(["diagnostics", "--json"]))?;
    assert_eq!(diag["cache"]["mode"], "filesystem");
    assert_eq!(diag["cache"]["compiled_templates"], 3);
    assert_eq!(diag["warmup"]["last"]["all"], true);
    assert_eq!(diag["persistence"]["compile_index"], "filesystem");

    tplcache(&env.project_dir)
        .arg("diagnostics")
        .assert()
        .success()
        .stdout(predicate::str::contains("compiled templates:"));
    Ok(())
}

#[test]
fn test_reset_metrics_reports_removed_files() -> Result<()> {
    let env = project()?;
    tplcache(&env.project_dir).args(["warmup", "--all"]).assert().success();

    let report = json_output(tplcache(&env.project_dir).args(["reset-metrics", "--include-index", "--json"]))?;
    let removed = report["removed"].as_array().expect("removed is an array");
    assert!(removed.iter().any(|l| l.as_str().is_some_and(|s| s.ends_with("compile-index.json"))));
    assert!(!env.file_exists("cache/warmup-summary.json"));
    Ok(())
}

#[test]
fn test_explicit_config_from_another_directory() -> Result<()> {
    let env = project()?;
    let elsewhere = tempfile::tempdir()?;
    let config = env.project_dir.join("tplcache.toml");

    tplcache(elsewhere.path())
        .arg("--config")
        .arg(&config)
        .args(["list", "--namespace", "admin"])
        .assert()
        .success()
        .stdout(predicate::str::contains("@admin/dash"));

    tplcache(elsewhere.path())
        .env("TPLCACHE_CONFIG", &config)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("home"));
    Ok(())
}

#[test]
fn test_invalid_config_is_reported() -> Result<()> {
    let env = project()?;
    env.write_file("tplcache.toml", "paths = [")?;
    tplcache(&env.project_dir)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("tplcache.toml"));
    Ok(())
}

#[test]
fn test_usage_errors() -> Result<()> {
    let env = project()?;
    tplcache(&env.project_dir)
        .arg("warmup")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--all"));
    tplcache(&env.project_dir).arg("invalidate").assert().failure();
    tplcache(&env.project_dir).args(["--verbose", "--quiet", "list"]).assert().failure();
    Ok(())
}
