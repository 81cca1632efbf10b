//! Test helpers for provider tests

use crate::config::{ConfigStore, ConfigValue};
use serde_json::json;

/// 在测试中安装 rustls crypto provider
///
/// 生产代码在 main.rs 中安装；重复调用时忽略错误即可。
pub fn ensure_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// In-memory configuration pointing the client at `api_base`.
///
/// `api_key_env` names the variable the provider will read the key from.
///
/// # Example
/// ```
/// use ab_cli::llm::provider::test_utils::test_config;
///
/// let config = test_config("http://127.0.0.1:9", "AB_TEST_KEY");
/// assert_eq!(config.api_settings().api_base, "http://127.0.0.1:9");
/// ```
pub fn test_config(api_base: &str, api_key_env: &str) -> ConfigStore {
    ConfigStore::from_document(
        "unused-config.json",
        ConfigValue::from(json!({
            "version": "1.0",
            "global": {
                "language": "en",
                "api_base": api_base,
                "api_key_env": api_key_env,
                "timeout_seconds": 30
            },
            "models": {
                "small": "test/small",
                "medium": "test/medium",
                "large": "test/large",
                "default": "test/default",
                "thresholds": {"small_max_tokens": 100, "medium_max_tokens": 1000}
            },
            "history": {"enabled": false}
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_points_at_base() {
        let config = test_config("http://localhost:1", "KEY_VAR");
        let settings = config.api_settings();
        assert_eq!(settings.api_key_env, "KEY_VAR");
        assert_eq!(settings.timeout_seconds, 30);
        assert!(!config.history_enabled());
    }
}
