//! Command implementations.
//!
//! # Architecture
//! ```text
//! CLI (cli.rs)
//!   ├── commands/config.rs, commands/prompt.rs
//!   ├── git:    auto_commit, branch_name, pr_description, changelog,
//!   │           resolve_conflict, rewrite_history
//!   ├── util:   explain, gen_script, passgenerator
//!   ├── models: models.rs
//!   └── shared options (commands/options.rs), value parsing (commands/format.rs)
//! ```
//!
//! Every LLM call goes through [`ask`]: token estimate, model selection,
//! spinner, then a history record.

pub mod auto_commit;
pub mod branch_name;
pub mod changelog;
pub mod config;
pub mod explain;
pub mod format;
pub mod gen_script;
pub mod models;
pub mod options;
pub mod passgenerator;
pub mod pr_description;
pub mod prompt;
pub mod resolve_conflict;
pub mod rewrite_history;

pub use options::*;

use crate::config::{ConfigStore, estimate_tokens, pick};
use crate::context::AssembledContext;
use crate::error::Result;
use crate::history::{CallDetails, HistoryRecorder};
use crate::llm::{Completion, CompletionRequest, LlmProvider, Specialist};
use crate::ui;

/// One LLM call made by a command.
#[derive(Debug, Clone)]
pub struct LlmCall<'a> {
    /// Command name used for per-command settings and the history record
    pub command: &'a str,
    pub prompt: String,
    pub context: String,
    pub language: String,
    pub specialist: Option<Specialist>,
    /// Explicit model; `None` lets the token estimate choose
    pub model: Option<String>,
    pub max_completion_tokens: Option<u32>,
    pub files: Option<&'a AssembledContext>,
    /// Spinner text; `None` hides the spinner
    pub spinner: Option<&'a str>,
}

impl<'a> LlmCall<'a> {
    pub fn new(command: &'a str, prompt: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            command,
            prompt: prompt.into(),
            context: String::new(),
            language: language.into(),
            specialist: None,
            model: None,
            max_completion_tokens: None,
            files: None,
            spinner: None,
        }
    }

    pub fn with_spinner(mut self, message: &'a str) -> Self {
        self.spinner = Some(message);
        self
    }
}

/// Send `call` to the provider and record it in the history.
pub async fn ask(
    provider: &dyn LlmProvider,
    config: &ConfigStore,
    call: LlmCall<'_>,
) -> Result<Completion> {
    let estimated = estimate_tokens(&format!("{}{}", call.prompt, call.context));
    let model = match call.model.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        Some(model) => model.to_string(),
        None => pick(estimated, config).model_id,
    };

    tracing::info!("Estimated tokens: {}", estimated);
    tracing::info!("Model: {}", model);
    tracing::info!("Lang: {}", call.language);

    let request = CompletionRequest::new(&model, call.prompt)
        .with_context(call.context)
        .with_language(&call.language)
        .with_specialist(call.specialist)
        .with_max_tokens(call.max_completion_tokens);

    let spinner = match call.spinner {
        Some(message) => ui::Spinner::new(message),
        None => ui::Spinner::hidden(),
    };
    let result = provider.complete(&request).await;
    spinner.finish_and_clear();
    let completion = result?;

    HistoryRecorder::from_config(config).record(
        &completion,
        &CallDetails {
            command: call.command,
            specialist: call.specialist,
            language: &call.language,
            max_completion_tokens: call.max_completion_tokens,
            files: call.files,
        },
    );

    Ok(completion)
}

/// Map a non-negative CLI/config integer to a completion cap; `<= 0` means no cap.
pub fn completion_cap(value: Option<i64>) -> Option<u32> {
    value
        .filter(|n| *n > 0)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmProvider;
    use crate::llm::provider::test_utils::test_config;

    #[tokio::test]
    async fn test_ask_picks_model_by_tokens() {
        let config = test_config("http://127.0.0.1:9", "AB_UNUSED_KEY");
        let mut provider = MockLlmProvider::new();
        provider
            .expect_complete()
            .withf(|req| req.model == "test/small" && req.language == "pt-br")
            .times(1)
            .returning(|req| {
                Ok(Completion {
                    text: "ok".into(),
                    model: req.model.clone(),
                    ..Default::default()
                })
            });

        let completion = ask(&provider, &config, LlmCall::new("prompt", "short", "pt-br"))
            .await
            .unwrap();
        assert_eq!(completion.text, "ok");
    }

    #[tokio::test]
    async fn test_ask_explicit_model_wins() {
        let config = test_config("http://127.0.0.1:9", "AB_UNUSED_KEY");
        let mut provider = MockLlmProvider::new();
        provider
            .expect_complete()
            .withf(|req| req.model == "vendor/explicit" && req.max_tokens == Some(50))
            .times(1)
            .returning(|_| Ok(Completion::default()));

        let mut call = LlmCall::new("prompt", "x".repeat(10_000), "en");
        call.model = Some("vendor/explicit".into());
        call.max_completion_tokens = Some(50);
        ask(&provider, &config, call).await.unwrap();
    }

    #[test]
    fn test_completion_cap() {
        assert_eq!(completion_cap(Some(16000)), Some(16000));
        assert_eq!(completion_cap(Some(0)), None);
        assert_eq!(completion_cap(Some(-1)), None);
        assert_eq!(completion_cap(None), None);
    }
}
