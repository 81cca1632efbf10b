//! 硬编码的默认配置文档

use serde_json::json;

use super::value::ConfigValue;
use crate::constants;

pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_API_KEY_ENV: &str = "OPENROUTER_API_KEY";
pub const DEFAULT_TIMEOUT_SECONDS: i64 = 300;
pub const DEFAULT_MODEL: &str = "nvidia/nemotron-3-nano-30b-a3b:free";
pub const DEFAULT_SMALL_MAX_TOKENS: i64 = 128_000;
pub const DEFAULT_MEDIUM_MAX_TOKENS: i64 = 256_000;
pub const DEFAULT_HISTORY_DIR: &str = "~/.ab/history";

/// Build the default document.
///
/// `load()` returns exactly this value when no file exists, and `init`
/// writes it to disk.
pub fn default_document() -> ConfigValue {
    ConfigValue::from(json!({
        "version": constants::config::VERSION,
        "global": {
            "language": DEFAULT_LANGUAGE,
            "api_base": DEFAULT_API_BASE,
            "api_key_env": DEFAULT_API_KEY_ENV,
            "timeout_seconds": DEFAULT_TIMEOUT_SECONDS
        },
        "models": {
            "small": DEFAULT_MODEL,
            "medium": "openai/gpt-5-nano",
            "large": "x-ai/grok-4.1-fast",
            "default": DEFAULT_MODEL,
            "thresholds": {
                "small_max_tokens": DEFAULT_SMALL_MAX_TOKENS,
                "medium_max_tokens": DEFAULT_MEDIUM_MAX_TOKENS
            }
        },
        "commands": {
            "auto-commit": {},
            "pr-description": {},
            "rewrite-history": {
                "smart_mode": true,
                "skip_merges": true
            },
            "prompt": {
                "max_tokens": 900_000,
                "max_tokens_doc": 250_000,
                "max_completion_tokens": 16_000
            },
            "passgenerator": {
                "default_length": 16
            }
        },
        "history": {
            "enabled": true,
            "directory": DEFAULT_HISTORY_DIR
        }
    }))
}

/// Flattened dotted keys of the default schema, sorted.
pub fn list_keys() -> Vec<String> {
    default_document().leaf_paths()
}

/// Schema default for a dotted key, if the schema defines one.
pub fn default_for(key: &str) -> Option<ConfigValue> {
    default_document().lookup(key).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_document_has_version() {
        let doc = default_document();
        assert_eq!(doc.lookup("version"), Some(&ConfigValue::from("1.0")));
    }

    #[test]
    fn test_default_thresholds_increasing() {
        let doc = default_document();
        let small = doc
            .lookup("models.thresholds.small_max_tokens")
            .and_then(ConfigValue::as_i64)
            .unwrap();
        let medium = doc
            .lookup("models.thresholds.medium_max_tokens")
            .and_then(ConfigValue::as_i64)
            .unwrap();
        assert!(small < medium);
    }

    #[test]
    fn test_list_keys_contains_known_paths() {
        let keys = list_keys();
        for key in [
            "global.language",
            "global.api_key_env",
            "models.default",
            "models.thresholds.medium_max_tokens",
            "commands.rewrite-history.smart_mode",
            "commands.prompt.max_tokens_doc",
            "history.directory",
            "version",
        ] {
            assert!(keys.contains(&key.to_string()), "missing {}", key);
        }
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_default_for_unknown_is_none() {
        assert_eq!(default_for("global.nope"), None);
        assert_eq!(
            default_for("global.timeout_seconds"),
            Some(ConfigValue::Int(300))
        );
    }
}
