use std::str::FromStr;

use crate::error::AbError;
use crate::llm::prompt::{ChangelogFormat, ScriptMode};

impl FromStr for ChangelogFormat {
    type Err = AbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "plain" | "text" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            other => Err(AbError::InvalidInput(format!(
                "Unknown changelog format '{}' (expected markdown, plain or json)",
                other
            ))),
        }
    }
}

impl FromStr for ScriptMode {
    type Err = AbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "script" | "full" => Ok(Self::Full),
            "cron" => Ok(Self::Cron),
            "oneshot" => Ok(Self::Oneshot),
            other => Err(AbError::InvalidInput(format!(
                "Unknown script type '{}' (expected script, cron or oneshot)",
                other
            ))),
        }
    }
}

/// `ab models list --sort`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelSort {
    #[default]
    Name,
    /// 上下文长度从大到小
    Context,
    /// prompt 价格从低到高
    Price,
}

impl FromStr for ModelSort {
    type Err = AbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "context" => Ok(Self::Context),
            "price" => Ok(Self::Price),
            other => Err(AbError::InvalidInput(format!(
                "Unknown sort key '{}' (expected name, context or price)",
                other
            ))),
        }
    }
}

/// 去掉 ```json 围栏；是合法 JSON 时重新缩进输出
pub fn pretty_json_or_raw(text: &str) -> String {
    let trimmed = text.trim();
    let unfenced = if trimmed.starts_with("```") {
        trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
    } else {
        trimmed
    };

    match serde_json::from_str::<serde_json::Value>(unfenced) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| unfenced.to_string()),
        Err(_) => unfenced.to_string(),
    }
}
