use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::{FixtureError, FixtureResult};

/// Environment-specific values substituted for `<<name>>` tokens in golden documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVars {
    vars: BTreeMap<String, String>,
}

impl TemplateVars {
    /// Read a newline-delimited `name=value` file.
    pub fn load(path: impl AsRef<Path>) -> FixtureResult<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| FixtureError::Io {
            source,
            path: path.to_path_buf(),
        })?;
        let vars = Self::parse(&data);
        debug!(path = %path.display(), count = vars.len(), "loaded template vars");
        Ok(vars)
    }

    pub fn parse(data: &str) -> Self {
        let mut vars = BTreeMap::new();
        for line in data.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (name, value) = line.split_once('=').unwrap_or((line, ""));
            vars.insert(name.trim().to_string(), value.trim().to_string());
        }
        Self { vars }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Substitute every `<<name>>` in the serialized document and parse the result back.
    ///
    /// Values are spliced into the JSON text verbatim, so a value containing an unescaped quote
    /// yields a [`FixtureError::Template`].
    pub fn apply(&self, value: &Value) -> FixtureResult<Value> {
        let mut text = serde_json::to_string(value).map_err(FixtureError::Template)?;
        for (name, replacement) in &self.vars {
            text = text.replace(&format!("<<{name}>>"), replacement);
        }
        serde_json::from_str(&text).map_err(FixtureError::Template)
    }

    /// Placeholder names still present anywhere in `value`, sorted and deduplicated.
    pub fn unresolved(value: &Value) -> Vec<String> {
        let mut found = Vec::new();
        collect_tokens(value, &mut found);
        found.sort();
        found.dedup();
        found
    }
}

/// Load `vars_file` and apply it to `value`.
pub fn set_ckan_vars(value: &Value, vars_file: impl AsRef<Path>) -> FixtureResult<Value> {
    TemplateVars::load(vars_file)?.apply(value)
}

fn collect_tokens(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::String(s) => scan_tokens(s, found),
        Value::Array(items) => items.iter().for_each(|item| collect_tokens(item, found)),
        Value::Object(map) => {
            for (key, val) in map {
                scan_tokens(key, found);
                collect_tokens(val, found);
            }
        }
        _ => {}
    }
}

fn scan_tokens(s: &str, found: &mut Vec<String>) {
    let mut rest = s;
    while let Some(start) = rest.find("<<") {
        let after = &rest[start + 2..];
        let Some(end) = after.find(">>") else {
            return;
        };
        found.push(after[..end].to_string());
        rest = &after[end + 2..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_on_first_equals_and_trims() {
        let vars = TemplateVars::parse(
            "CKAN_BASE_URL = https://example.org/?a=b\n\n# comment\nEMPTY\n  ORG=gov \n",
        );
        assert_eq!(vars.get("CKAN_BASE_URL"), Some("https://example.org/?a=b"));
        assert_eq!(vars.get("EMPTY"), Some(""));
        assert_eq!(vars.get("ORG"), Some("gov"));
        assert_eq!(vars.len(), 3);
    }

    #[test]
    fn later_lines_override_earlier_ones() {
        let vars = TemplateVars::parse("A=1\nA=2\n");
        assert_eq!(vars.get("A"), Some("2"));
    }

    #[test]
    fn scan_finds_multiple_tokens_in_one_string() {
        let mut found = Vec::new();
        scan_tokens("<<a>>/x/<<b-value>> <<unterminated", &mut found);
        assert_eq!(found, vec!["a".to_string(), "b-value".to_string()]);
    }
}
