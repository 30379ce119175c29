//! Normalization of CKAN responses so that live and golden documents can be compared without
//! tripping over values that legitimately differ between environments or runs.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

/// Field names whose values are environment- or time-dependent.
pub const UNSTABLE_KEYS: &[&str] = &[
    "_version_",
    "created",
    "creator_user_id",
    "data_dict",
    "harvest_source_reference",
    "id",
    "import_source",
    "indexed_ts",
    "metadata_created",
    "metadata_modified",
    "owner_org",
    "package_count",
    "package_id",
    "revision_id",
    "validated_data_dict",
];

/// Keys holding lists of `{"key": .., "value": ..}` pairs (CKAN's extensible metadata).
pub const KEY_VALUE_KEYS: &[&str] = &["harvest", "extras"];

pub fn is_unstable_key(key: &str) -> bool {
    UNSTABLE_KEYS.contains(&key)
}

fn is_key_value_key(key: &str) -> bool {
    KEY_VALUE_KEYS.contains(&key)
}

/// Drop every unstable field, recursively. Inside arrays, key/value pairs whose `key` names an
/// unstable field are dropped as well.
pub fn strip_unstable_data(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(strip_map(map)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|item| !is_unstable_pair(item))
                .map(strip_unstable_data)
                .collect(),
        ),
        other => other,
    }
}

fn strip_map(map: Map<String, Value>) -> Map<String, Value> {
    let mut cleaned = Map::new();
    for (key, val) in map {
        if is_unstable_key(&key) {
            continue;
        }
        cleaned.insert(key, strip_unstable_data(val));
    }
    cleaned
}

fn is_unstable_pair(item: &Value) -> bool {
    let Value::Object(pair) = item else {
        return false;
    };
    pair.len() == 2
        && pair.contains_key("value")
        && pair
            .get("key")
            .and_then(Value::as_str)
            .is_some_and(is_unstable_key)
}

/// Placeholder token for `name`, e.g. `<<revision_id>>`.
pub fn placeholder(name: &str) -> String {
    format!("<<{name}>>")
}

fn is_placeholder(value: &Value) -> bool {
    value.as_str().is_some_and(|s| s.starts_with("<<"))
}

/// Replaces unstable values with `<<name>>` placeholders in place, turning a captured response
/// into a golden template.
#[derive(Debug, Clone)]
pub struct UnstableTemplater {
    ignore: BTreeSet<String>,
    clean: BTreeSet<String>,
    key_value: bool,
}

impl Default for UnstableTemplater {
    fn default() -> Self {
        Self {
            ignore: BTreeSet::new(),
            clean: BTreeSet::new(),
            key_value: true,
        }
    }
}

impl UnstableTemplater {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys to leave alone at every depth.
    pub fn ignore<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Top-level keys whose whole value becomes a placeholder. Not applied below the root.
    pub fn clean<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clean.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Whether `harvest`/`extras` pair values are templated at the top level.
    pub fn key_value(mut self, enabled: bool) -> Self {
        self.key_value = enabled;
        self
    }

    /// Each record of a top-level list is treated as a top-level document.
    pub fn apply(&self, value: &mut Value) {
        match value {
            Value::Array(items) => {
                for item in items {
                    walk(item, None, &self.ignore, &self.clean, self.key_value);
                }
            }
            other => walk(other, None, &self.ignore, &self.clean, self.key_value),
        }
    }

    /// Owned convenience around [`UnstableTemplater::apply`].
    pub fn template(&self, mut value: Value) -> Value {
        self.apply(&mut value);
        value
    }
}

fn walk(
    value: &mut Value,
    parent: Option<&str>,
    ignore: &BTreeSet<String>,
    clean: &BTreeSet<String>,
    key_value: bool,
) {
    let Value::Object(map) = value else {
        return;
    };
    // Below the root the clean set is dropped and key/value mode is back on.
    let nested_clean: BTreeSet<String> = BTreeSet::new();

    for (key, entry) in map.iter_mut() {
        if ignore.contains(key) {
            continue;
        }

        if clean.contains(key) {
            *entry = Value::String(placeholder(key));
        } else if key_value && is_key_value_key(key) {
            template_pairs(entry);
        } else if let Value::Array(items) = &mut *entry {
            for item in items {
                walk(item, Some(key.as_str()), ignore, &nested_clean, true);
            }
        } else if entry.is_object() {
            walk(entry, Some(key.as_str()), ignore, &nested_clean, true);
        } else if is_unstable_key(key) && !is_placeholder(entry) {
            if key.as_str() == "id" && parent.is_none() {
                continue;
            }
            *entry = Value::String(placeholder(key));
        }
    }
}

fn template_pairs(entry: &mut Value) {
    let Value::Array(items) = entry else {
        return;
    };
    for item in items {
        let Value::Object(pair) = item else {
            continue;
        };
        let Some(name) = pair.get("key").and_then(Value::as_str) else {
            continue;
        };
        let token = placeholder(&format!("{name}-value"));
        pair.insert("value".into(), Value::String(token));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pair_detection_requires_exactly_key_and_value() {
        assert!(is_unstable_pair(&json!({"key": "id", "value": 1})));
        assert!(!is_unstable_pair(&json!({"key": "id", "value": 1, "state": "x"})));
        assert!(!is_unstable_pair(&json!({"key": "title", "value": 1})));
        assert!(!is_unstable_pair(&json!({"key": 3, "value": 1})));
        assert!(!is_unstable_pair(&json!("id")));
    }

    #[test]
    fn placeholders_are_detected_only_on_strings() {
        assert!(is_placeholder(&json!("<<id>>")));
        assert!(!is_placeholder(&json!("id")));
        assert!(!is_placeholder(&json!(12)));
    }
}
