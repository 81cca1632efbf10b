//! Tagged value type for the configuration document
//!
//! The document is JSON on disk but is addressed by dotted keys at runtime,
//! so every node is a [`ConfigValue`] and every lookup goes through
//! [`ConfigValue::lookup`] / [`ConfigValue::insert_path`] instead of ad-hoc
//! `serde_json::Value` indexing.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AbError, Result};

/// One node of the configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum ConfigValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Map(BTreeMap<String, ConfigValue>),
    List(Vec<ConfigValue>),
    Null,
}

impl ConfigValue {
    /// Empty map, the shape of every section.
    pub fn empty_map() -> Self {
        ConfigValue::Map(BTreeMap::new())
    }

    /// Whether the value counts as "not provided" for precedence resolution.
    ///
    /// `Null` and the empty string are unset; `0` and `false` are real values.
    pub fn is_unset(&self) -> bool {
        match self {
            ConfigValue::Null => true,
            ConfigValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, ConfigValue>> {
        match self {
            ConfigValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Walk a dotted path. Returns `None` when any segment is missing or when
    /// the walk has to descend through a non-map.
    pub fn lookup(&self, path: &str) -> Option<&ConfigValue> {
        let mut current = self;
        for segment in path.split('.') {
            current = current.as_map()?.get(segment)?;
        }
        Some(current)
    }

    /// Write `value` at a dotted path, creating intermediate maps as needed.
    ///
    /// Fails with [`AbError::InvalidConfigKey`] if an intermediate node exists
    /// but is a scalar (e.g. writing `global.language.x`).
    pub fn insert_path(&mut self, path: &str, value: ConfigValue) -> Result<()> {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(AbError::InvalidConfigKey(path.to_string()));
        }

        let (leaf, parents) = match segments.split_last() {
            Some(split) => split,
            None => return Err(AbError::InvalidConfigKey(path.to_string())),
        };

        let mut current = self;
        for (depth, segment) in parents.iter().enumerate() {
            let map = match current {
                ConfigValue::Map(map) => map,
                _ => {
                    return Err(AbError::InvalidConfigKey(format!(
                        "{} ('{}' is not a section)",
                        path,
                        segments[..depth].join(".")
                    )));
                }
            };
            current = map
                .entry((*segment).to_string())
                .or_insert_with(ConfigValue::empty_map);
        }

        match current {
            ConfigValue::Map(map) => {
                map.insert((*leaf).to_string(), value);
                Ok(())
            }
            _ => Err(AbError::InvalidConfigKey(format!(
                "{} ('{}' is not a section)",
                path,
                parents.join(".")
            ))),
        }
    }

    /// Deep merge: maps merge key by key, anything else in `overlay` replaces.
    pub fn merge(&mut self, overlay: &ConfigValue) {
        match (self, overlay) {
            (ConfigValue::Map(base), ConfigValue::Map(over)) => {
                for (key, value) in over {
                    match base.get_mut(key) {
                        Some(existing)
                            if existing.as_map().is_some() && value.as_map().is_some() =>
                        {
                            existing.merge(value)
                        }
                        _ => {
                            base.insert(key.clone(), value.clone());
                        }
                    }
                }
            }
            (slot, value) => *slot = value.clone(),
        }
    }

    /// All dotted paths that end in a non-map leaf, in sorted order.
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_leaf_paths(self, "", &mut out);
        out.sort();
        out
    }

    /// Coerce a raw command-line string into a typed value.
    ///
    /// - `true` / `false` (any case) become booleans
    /// - an optionally signed decimal integer becomes `Int`
    /// - text starting with `{` or `[` that parses as JSON becomes a map/list
    /// - anything else stays a string
    pub fn coerce(raw: &str) -> ConfigValue {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            return ConfigValue::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return ConfigValue::Bool(false);
        }
        if is_integer_literal(trimmed)
            && let Ok(n) = trimmed.parse::<i64>()
        {
            return ConfigValue::Int(n);
        }
        if (trimmed.starts_with('{') || trimmed.starts_with('['))
            && let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed)
        {
            return ConfigValue::from(json);
        }
        ConfigValue::String(raw.to_string())
    }

    /// Render for terminal output: scalars bare, maps/lists as pretty JSON.
    pub fn display_value(&self) -> String {
        match self {
            ConfigValue::Map(_) | ConfigValue::List(_) => {
                serde_json::to_string_pretty(&serde_json::Value::from(self.clone()))
                    .unwrap_or_default()
            }
            other => other.to_string(),
        }
    }
}

fn is_integer_literal(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn collect_leaf_paths(value: &ConfigValue, prefix: &str, out: &mut Vec<String>) {
    if let ConfigValue::Map(map) = value {
        for (key, child) in map {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };
            match child {
                ConfigValue::Map(inner) if !inner.is_empty() => {
                    collect_leaf_paths(child, &path, out)
                }
                // 空 section（如 commands.auto-commit）没有 leaf
                ConfigValue::Map(_) => {}
                _ => out.push(path),
            }
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::String(s) => write!(f, "{}", s),
            ConfigValue::Int(n) => write!(f, "{}", n),
            ConfigValue::Float(x) => write!(f, "{}", x),
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::Null => write!(f, "null"),
            ConfigValue::Map(_) | ConfigValue::List(_) => {
                write!(f, "{}", serde_json::Value::from(self.clone()))
            }
        }
    }
}

impl From<serde_json::Value> for ConfigValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ConfigValue::Null,
            serde_json::Value::Bool(b) => ConfigValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => ConfigValue::Int(i),
                None => ConfigValue::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => ConfigValue::String(s),
            serde_json::Value::Array(items) => {
                ConfigValue::List(items.into_iter().map(ConfigValue::from).collect())
            }
            serde_json::Value::Object(map) => ConfigValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, ConfigValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<ConfigValue> for serde_json::Value {
    fn from(value: ConfigValue) -> Self {
        match value {
            ConfigValue::Null => serde_json::Value::Null,
            ConfigValue::Bool(b) => serde_json::Value::Bool(b),
            ConfigValue::Int(n) => serde_json::Value::from(n),
            ConfigValue::Float(x) => serde_json::Number::from_f64(x)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ConfigValue::String(s) => serde_json::Value::String(s),
            ConfigValue::List(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
            ConfigValue::Map(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::String(s)
    }
}

impl From<i64> for ConfigValue {
    fn from(n: i64) -> Self {
        ConfigValue::Int(n)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> ConfigValue {
        ConfigValue::from(json!({
            "global": {"language": "en", "timeout_seconds": 300},
            "models": {"thresholds": {"small_max_tokens": 128000}}
        }))
    }

    #[test]
    fn test_lookup_nested() {
        let doc = sample();
        assert_eq!(
            doc.lookup("models.thresholds.small_max_tokens"),
            Some(&ConfigValue::Int(128000))
        );
        assert_eq!(doc.lookup("global.language").and_then(|v| v.as_str()), Some("en"));
    }

    #[test]
    fn test_lookup_through_scalar_is_none() {
        let doc = sample();
        assert_eq!(doc.lookup("global.language.extra"), None);
        assert_eq!(doc.lookup("missing.key"), None);
    }

    #[test]
    fn test_insert_creates_intermediate_maps() {
        let mut doc = sample();
        doc.insert_path("commands.explain.language", "pt-br".into())
            .unwrap();
        assert_eq!(
            doc.lookup("commands.explain.language"),
            Some(&ConfigValue::from("pt-br"))
        );
    }

    #[test]
    fn test_insert_through_scalar_fails() {
        let mut doc = sample();
        let err = doc
            .insert_path("global.language.x", ConfigValue::Bool(true))
            .unwrap_err();
        assert!(matches!(err, AbError::InvalidConfigKey(_)));
        // 原文档不变
        assert_eq!(doc, sample());
    }

    #[test]
    fn test_coerce_rules() {
        assert_eq!(ConfigValue::coerce("true"), ConfigValue::Bool(true));
        assert_eq!(ConfigValue::coerce("FALSE"), ConfigValue::Bool(false));
        assert_eq!(ConfigValue::coerce("42"), ConfigValue::Int(42));
        assert_eq!(ConfigValue::coerce("-7"), ConfigValue::Int(-7));
        assert_eq!(ConfigValue::coerce("1.5"), ConfigValue::from("1.5"));
        assert_eq!(ConfigValue::coerce("x-ai/grok"), ConfigValue::from("x-ai/grok"));
        assert_eq!(
            ConfigValue::coerce(r#"{"a": 1}"#),
            ConfigValue::from(json!({"a": 1}))
        );
        assert_eq!(ConfigValue::coerce("[oops"), ConfigValue::from("[oops"));
    }

    #[test]
    fn test_merge_is_deep() {
        let mut base = sample();
        let overlay = ConfigValue::from(json!({"global": {"language": "pt-br"}}));
        base.merge(&overlay);
        assert_eq!(
            base.lookup("global.language"),
            Some(&ConfigValue::from("pt-br"))
        );
        assert_eq!(
            base.lookup("global.timeout_seconds"),
            Some(&ConfigValue::Int(300))
        );
    }

    #[test]
    fn test_leaf_paths_sorted_and_skip_empty_sections() {
        let doc = ConfigValue::from(json!({
            "b": {"y": 1, "x": {}},
            "a": 2
        }));
        assert_eq!(doc.leaf_paths(), vec!["a".to_string(), "b.y".to_string()]);
    }

    #[test]
    fn test_is_unset() {
        assert!(ConfigValue::Null.is_unset());
        assert!(ConfigValue::from("").is_unset());
        assert!(!ConfigValue::Int(0).is_unset());
        assert!(!ConfigValue::Bool(false).is_unset());
    }

    #[test]
    fn test_json_round_trip_keeps_floats() {
        let value: ConfigValue = serde_json::from_str(r#"{"t": 0.25, "n": null}"#).unwrap();
        assert_eq!(value.lookup("t"), Some(&ConfigValue::Float(0.25)));
        assert_eq!(value.lookup("n"), Some(&ConfigValue::Null));
        let back = serde_json::to_string(&value).unwrap();
        assert!(back.contains("0.25"));
    }
}
