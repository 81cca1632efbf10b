use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AbError>;

#[derive(Error, Debug)]
pub enum AbError {
    #[error("Configuration file {} is not valid JSON: {source}", path.display())]
    ConfigCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration file {} has unsupported version '{version}'", path.display())]
    UnsupportedConfigVersion { path: PathBuf, version: String },

    #[error("Unknown configuration key: {0}")]
    UnknownConfigKey(String),

    #[error("Invalid configuration key: {0}")]
    InvalidConfigKey(String),

    #[error(
        "models.thresholds.small_max_tokens ({small}) must be lower than medium_max_tokens ({medium})"
    )]
    ThresholdInvariantViolation { small: i64, medium: i64 },

    #[error("Environment variable {0} is not defined")]
    MissingCredential(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Git command failed: {0}")]
    GitCommand(String),

    #[error("Not inside a git repository")]
    NotInGitRepo,

    #[error("LLM provider error: {0}")]
    Llm(String),

    #[error("LLM API error ({status}): {message}")]
    LlmApi { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Invalid .aiignore pattern: {0}")]
    IgnorePattern(#[from] globset::Error),

    #[error("Prompt error: {0}")]
    Prompt(String),

    #[error("Operation cancelled by user")]
    UserCancelled,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 通用错误类型，用于不适合其他分类的错误
    #[error("{0}")]
    Other(String),
}

impl From<inquire::InquireError> for AbError {
    fn from(err: inquire::InquireError) -> Self {
        match err {
            inquire::InquireError::OperationCanceled
            | inquire::InquireError::OperationInterrupted => AbError::UserCancelled,
            other => AbError::Prompt(other.to_string()),
        }
    }
}

impl AbError {
    /// 获取错误的解决建议
    pub fn suggestion(&self) -> Option<String> {
        match self {
            AbError::ConfigCorrupt { .. } => Some(
                "Fix the JSON by hand with 'ab config edit', or recreate it with 'ab config init --force' (the old file is kept as config.json.bak)"
                    .to_string(),
            ),
            AbError::UnsupportedConfigVersion { .. } => Some(
                "Back up the file and run 'ab config init --force' to create a version 1.0 document"
                    .to_string(),
            ),
            AbError::UnknownConfigKey(_) => {
                Some("Run 'ab config list-keys' to see the available keys".to_string())
            }
            AbError::InvalidConfigKey(_) => Some(
                "Keys use dot notation with at least two segments, e.g. global.language"
                    .to_string(),
            ),
            AbError::ThresholdInvariantViolation { .. } => Some(
                "Keep models.thresholds.small_max_tokens strictly below medium_max_tokens"
                    .to_string(),
            ),
            AbError::MissingCredential(var) => Some(format!(
                "Export your OpenRouter key first: export {}=sk-or-...",
                var
            )),
            AbError::NotInGitRepo => Some("Run this command inside a git repository".to_string()),
            AbError::Network(_) => Some(
                "Check your network connection, proxy settings, or global.api_base".to_string(),
            ),
            AbError::LlmApi { status: 401, .. } => {
                Some("Check if your API key is valid and has not expired".to_string())
            }
            AbError::LlmApi { status: 429, .. } => Some(
                "Rate limit exceeded. Wait a moment and try again, or pick another model"
                    .to_string(),
            ),
            AbError::LlmApi { status, .. } if *status >= 500 => Some(
                "API service is temporarily unavailable. Try again in a few moments".to_string(),
            ),
            AbError::Llm(msg) if msg.contains("timeout") => Some(
                "The API request timed out. Raise global.timeout_seconds or try again later"
                    .to_string(),
            ),
            AbError::Llm(msg) if msg.contains("Failed to parse") => Some(
                "Try using --verbose flag to see the full LLM response and debug the issue"
                    .to_string(),
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // === 配置错误 ===

    #[test]
    fn test_config_corrupt_names_path() {
        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = AbError::ConfigCorrupt {
            path: PathBuf::from("/home/u/.ab/config.json"),
            source,
        };
        assert!(err.to_string().contains("/home/u/.ab/config.json"));
        assert!(err.suggestion().unwrap().contains("ab config init --force"));
    }

    #[test]
    fn test_suggestion_unknown_key() {
        let err = AbError::UnknownConfigKey("foo.bar".to_string());
        assert!(err.suggestion().unwrap().contains("list-keys"));
    }

    #[test]
    fn test_threshold_violation_message() {
        let err = AbError::ThresholdInvariantViolation {
            small: 300000,
            medium: 256000,
        };
        let msg = err.to_string();
        assert!(msg.contains("300000"));
        assert!(msg.contains("256000"));
    }

    #[test]
    fn test_suggestion_missing_credential_names_variable() {
        let err = AbError::MissingCredential("MY_KEY".to_string());
        assert!(err.suggestion().unwrap().contains("export MY_KEY="));
    }

    // === LLM 错误 ===

    #[test]
    fn test_suggestion_llm_api_status() {
        let unauthorized = AbError::LlmApi {
            status: 401,
            message: "bad key".to_string(),
        };
        assert!(unauthorized.suggestion().unwrap().contains("API key"));

        let limited = AbError::LlmApi {
            status: 429,
            message: String::new(),
        };
        assert!(limited.suggestion().unwrap().contains("Rate limit"));

        let unavailable = AbError::LlmApi {
            status: 503,
            message: String::new(),
        };
        assert!(
            unavailable
                .suggestion()
                .unwrap()
                .contains("temporarily unavailable")
        );
    }

    #[test]
    fn test_suggestion_llm_timeout() {
        let err = AbError::Llm("Request timeout after 300s".to_string());
        assert!(err.suggestion().unwrap().contains("timeout_seconds"));
    }

    #[test]
    fn test_inquire_cancel_maps_to_user_cancelled() {
        let err: AbError = inquire::InquireError::OperationCanceled.into();
        assert!(matches!(err, AbError::UserCancelled));
    }

    // === 无建议的分支 ===

    #[test]
    fn test_suggestion_returns_none_for_other_errors() {
        let cases = vec![
            AbError::UserCancelled,
            AbError::InvalidInput("bad input".to_string()),
            AbError::Other("random error".to_string()),
            AbError::GitCommand("git failed".to_string()),
            AbError::Config("some random config error".to_string()),
            AbError::Llm("some random llm error".to_string()),
            AbError::LlmApi {
                status: 400,
                message: "bad request".to_string(),
            },
        ];

        for err in cases {
            assert!(
                err.suggestion().is_none(),
                "Expected None for {:?}, got {:?}",
                err,
                err.suggestion()
            );
        }
    }
}
