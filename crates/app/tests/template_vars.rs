use std::fs;

use ckan_functional_tests::{FixtureError, TemplateVars, set_ckan_vars};
use serde_json::json;
use tempfile::tempdir;

#[test]
fn substitutes_configured_base_url() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let vars_file = dir.path().join("ckan-vars.conf");
    fs::write(&vars_file, "CKAN_BASE_URL=https://example.org\n")?;

    let golden = json!({"url": "<<CKAN_BASE_URL>>/dataset/x", "name": "x"});
    let resolved = set_ckan_vars(&golden, &vars_file)?;

    assert_eq!(
        resolved,
        json!({"url": "https://example.org/dataset/x", "name": "x"})
    );
    assert!(TemplateVars::unresolved(&resolved).is_empty());
    Ok(())
}

#[test]
fn substitutes_every_occurrence_at_any_depth() -> anyhow::Result<()> {
    let vars = TemplateVars::parse("HOST=ckan.local\nORG=gov\n");
    let golden = json!({
        "links": ["http://<<HOST>>/a", "http://<<HOST>>/b"],
        "organization": {"name": "<<ORG>>", "title": "<<ORG>> at <<HOST>>"},
        "count": 2
    });

    let resolved = vars.apply(&golden)?;
    assert_eq!(
        resolved,
        json!({
            "links": ["http://ckan.local/a", "http://ckan.local/b"],
            "organization": {"name": "gov", "title": "gov at ckan.local"},
            "count": 2
        })
    );
    Ok(())
}

#[test]
fn unconfigured_placeholders_are_left_and_reported() -> anyhow::Result<()> {
    let vars = TemplateVars::parse("HOST=ckan.local\n");
    let resolved = vars.apply(&json!({
        "url": "http://<<HOST>>/x",
        "id": "<<id>>",
        "extras": [{"key": "k", "value": "<<k-value>>"}]
    }))?;

    assert_eq!(resolved["url"], "http://ckan.local/x");
    assert_eq!(
        TemplateVars::unresolved(&resolved),
        vec!["id".to_string(), "k-value".to_string()]
    );
    Ok(())
}

#[test]
fn missing_vars_file_is_an_io_error() {
    let dir = tempdir().expect("temp dir");
    let err = set_ckan_vars(&json!({}), dir.path().join("absent.conf")).unwrap_err();
    assert!(matches!(err, FixtureError::Io { .. }), "got {err}");
}

#[test]
fn value_breaking_json_syntax_is_a_template_error() {
    let vars = TemplateVars::parse("QUOTE=say \"hi\"\n");
    let err = vars.apply(&json!({"greeting": "<<QUOTE>>"})).unwrap_err();
    assert!(matches!(err, FixtureError::Template(_)), "got {err}");
}

#[test]
fn escaped_quotes_in_values_survive_substitution() -> anyhow::Result<()> {
    // The token sits inside a string, so a value containing `\"` stays valid JSON.
    let vars = TemplateVars::parse(r#"QUOTED=say \"hi\""#);
    let resolved = vars.apply(&json!({"greeting": "<<QUOTED>>"}))?;
    assert_eq!(resolved["greeting"], "say \"hi\"");
    Ok(())
}
