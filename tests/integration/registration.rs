//! Late-bound functions and filters across engine lifecycles.

use anyhow::Result;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tplcache::core::TplError;
use tplcache::test_utils::TestEnvironment;

fn site() -> Result<TestEnvironment> {
    TestEnvironment::builder()?
        .with_template("price.html", "{{ amount | money }}")
        .with_template("stamp.html", "{{ stamp() }}")
        .with_template("badge.html", "{{ label | badge }}")
        .without_cache()
        .build()
}

#[test]
fn test_function_registered_before_engine_survives_resets() -> Result<()> {
    let env = site()?;
    let mut manager = env.manager();
    manager.register_function("stamp", Arc::new(|_| Ok(json!("v1"))), &Value::Null)?;
    assert!(!manager.engine_ready());

    assert_eq!(manager.render("stamp", &json!({}))?, "v1");
    assert!(manager.engine_ready());

    manager.add_path(env.project_dir.join("more"), Some("more"));
    manager.reset_engine();
    assert_eq!(manager.render("stamp", &json!({}))?, "v1");
    assert_eq!(manager.diagnostics().environment_resets, 1);
    Ok(())
}

#[test]
fn test_registration_on_live_engine_applies_immediately() -> Result<()> {
    let env = site()?;
    let mut manager = env.manager();
    assert!(manager.render("price", &json!({"amount": 5})).is_err());

    manager.register_filter(
        "money",
        Arc::new(|value, _| Ok(json!(format!("${}.00", value)))),
        &json!(false),
    )?;
    assert!(manager.engine_ready());
    assert_eq!(manager.render("price", &json!({"amount": 5}))?, "$5.00");
    assert_eq!(manager.registry().filters().counts().active, 1);
    Ok(())
}

#[test]
fn test_unregister_before_engine_purges_pending() -> Result<()> {
    let env = site()?;
    let mut manager = env.manager();
    manager.register_function("stamp", Arc::new(|_| Ok(json!("gone"))), &json!(true))?;
    assert_eq!(manager.registry().functions().counts().pending, 1);

    assert!(manager.unregister_function("stamp"));
    assert_eq!(manager.registry().functions().counts().pending, 0);
    assert!(manager.render("stamp", &json!({})).is_err());
    Ok(())
}

#[test]
fn test_safe_filter_output_is_not_escaped() -> Result<()> {
    let env = site()?;
    let mut manager = env.manager();
    let badge = |value: &Value, _: &HashMap<String, Value>| -> tera::Result<Value> {
        Ok(json!(format!("<span>{}</span>", value.as_str().unwrap_or_default())))
    };

    manager.register_filter("badge", Arc::new(badge), &json!({"is_safe": ["html"]}))?;
    assert_eq!(manager.render("badge", &json!({"label": "new"}))?, "<span>new</span>");

    manager.register_filter("badge", Arc::new(badge), &json!({"safe": false}))?;
    assert_eq!(
        manager.render("badge", &json!({"label": "new"}))?,
        "&lt;span&gt;new&lt;&#x2F;span&gt;"
    );
    Ok(())
}

#[test]
fn test_bad_options_are_rejected() -> Result<()> {
    let env = site()?;
    let mut manager = env.manager();
    let err = manager
        .register_filter("money", Arc::new(|v, _| Ok(v.clone())), &json!(42))
        .unwrap_err();
    assert!(matches!(err, TplError::InvalidRegistrationOptions { kind: "filter", .. }));
    assert!(manager.registry().filters().names().is_empty());
    Ok(())
}
