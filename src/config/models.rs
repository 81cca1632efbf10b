//! Token-count based model selection

use std::fmt;

use super::defaults::DEFAULT_MODEL;
use super::store::ConfigStore;
use super::value::ConfigValue;
use crate::constants;

/// Model-selection bucket keyed by estimated token count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Small,
    Medium,
    Large,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Small => "small",
            Tier::Medium => "medium",
            Tier::Large => "large",
        }
    }

    /// Bucket for `tokens` given inclusive upper bounds.
    pub fn for_tokens(tokens: u64, small_max: i64, medium_max: i64) -> Self {
        let tokens = i128::from(tokens);
        if tokens <= i128::from(small_max) {
            Tier::Small
        } else if tokens <= i128::from(medium_max) {
            Tier::Medium
        } else {
            Tier::Large
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`pick`]. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model_id: String,
    pub tier: Tier,
    /// The tier's own entry was empty and `models.default` was used.
    pub used_default: bool,
}

/// Pick a model for `tokens` from `models.*` in the effective configuration.
///
/// Pure: reads only thresholds and the model table. The boundary value
/// belongs to the lower tier.
pub fn pick(tokens: u64, config: &ConfigStore) -> ModelSelection {
    let (small_max, medium_max) = config.thresholds();
    let tier = Tier::for_tokens(tokens, small_max, medium_max);

    let models = config.effective();
    let tier_model = model_at(models, &format!("models.{}", tier));

    let selection = match tier_model {
        Some(model_id) => ModelSelection {
            model_id,
            tier,
            used_default: false,
        },
        None => ModelSelection {
            model_id: model_at(models, "models.default")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            tier,
            used_default: true,
        },
    };

    tracing::debug!(
        "Selected model {} (tier {}, {} tokens, default fallback: {})",
        selection.model_id,
        selection.tier,
        tokens,
        selection.used_default
    );
    selection
}

/// Rough token estimate: one token per four characters.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() / constants::llm::CHARS_PER_TOKEN) as u64
}

fn model_at(document: &ConfigValue, key: &str) -> Option<String> {
    document
        .lookup(key)
        .and_then(ConfigValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn store(models: serde_json::Value) -> ConfigStore {
        ConfigStore::from_document("unused.json", ConfigValue::from(json!({ "models": models })))
    }

    fn scenario() -> ConfigStore {
        store(json!({
            "small": "A", "medium": "B", "large": "C", "default": "D",
            "thresholds": {"small_max_tokens": 128000, "medium_max_tokens": 256000}
        }))
    }

    #[test]
    fn test_pick_scenario() {
        let config = scenario();
        let cases = [
            (50_000, "A", Tier::Small),
            (128_000, "A", Tier::Small),
            (128_001, "B", Tier::Medium),
            (256_000, "B", Tier::Medium),
            (999_999, "C", Tier::Large),
        ];
        for (tokens, model, tier) in cases {
            let selection = pick(tokens, &config);
            assert_eq!(selection.model_id, model, "tokens {}", tokens);
            assert_eq!(selection.tier, tier);
            assert!(!selection.used_default);
        }
    }

    #[test]
    fn test_empty_tier_falls_back_to_default() {
        let config = store(json!({
            "small": "A", "medium": "B", "large": "", "default": "D",
            "thresholds": {"small_max_tokens": 128000, "medium_max_tokens": 256000}
        }));
        let selection = pick(999_999, &config);
        assert_eq!(selection.model_id, "D");
        assert_eq!(selection.tier, Tier::Large);
        assert!(selection.used_default);
    }

    #[test]
    fn test_missing_default_uses_builtin() {
        let config = store(json!({}));
        let selection = pick(10, &config);
        assert_eq!(selection.model_id, DEFAULT_MODEL);
        assert!(selection.used_default);
    }

    #[test]
    fn test_tier_monotonic() {
        let mut last = Tier::Small;
        for tokens in (0..600_000u64).step_by(997) {
            let tier = Tier::for_tokens(tokens, 128_000, 256_000);
            assert!(tier >= last);
            last = tier;
        }
    }

    #[test]
    fn test_selection_is_idempotent() {
        let config = scenario();
        assert_eq!(pick(200_000, &config), pick(200_000, &config));
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens(&"x".repeat(4001)), 1000);
    }
}
