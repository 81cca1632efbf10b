//! LLM request types and the provider trait.
//!
//! Every command builds a [`CompletionRequest`], hands it to an
//! [`LlmProvider`], and applies the returned [`Completion`] text.

/// Prompt templates for the git and util commands.
pub mod prompt;
/// OpenRouter client and HTTP helpers.
pub mod provider;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AbError, Result};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Persona prepended to the prompt and sent as the system message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Specialist {
    Dev,
    Rm,
}

impl Specialist {
    pub fn as_str(&self) -> &'static str {
        match self {
            Specialist::Dev => "dev",
            Specialist::Rm => "rm",
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            Specialist::Dev => {
                "Act as a senior software engineer with more than twenty years of hands-on experience. \
                 Give clear, efficient and well-structured answers that follow industry practice. \
                 Reason step by step."
            }
            Specialist::Rm => {
                "Act as a senior Retail Media analyst focused on digital advertising for e-commerce \
                 and marketplaces, familiar with platforms such as Amazon Ads, Mercado Ads and Criteo. \
                 Keep answers analytical, strategic and grounded in data."
            }
        }
    }
}

impl fmt::Display for Specialist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Specialist {
    type Err = AbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dev" => Ok(Specialist::Dev),
            "rm" => Ok(Specialist::Rm),
            other => Err(AbError::InvalidInput(format!(
                "Unknown specialist '{}'. Expected 'dev' or 'rm'",
                other
            ))),
        }
    }
}

/// One chat message in the request payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Everything needed for a single completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    /// Assembled file context, appended under a `FILE CONTEXT` header.
    pub context: String,
    pub language: String,
    pub specialist: Option<Specialist>,
    /// Completion cap. `None` or `Some(0)` means no limit is sent.
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            context: String::new(),
            language: "en".to_string(),
            specialist: None,
            max_tokens: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_specialist(mut self, specialist: Option<Specialist>) -> Self {
        self.specialist = specialist;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Prompt text actually sent as the user message.
    pub fn full_prompt(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(4);
        if let Some(specialist) = self.specialist {
            parts.push(specialist.prefix().to_string());
        }
        parts.push(self.prompt.clone());
        if !self.context.trim().is_empty() {
            parts.push(format!("\n--- FILE CONTEXT ---\n{}", self.context));
        }
        parts.push(format!(
            "--- OUTPUT INSTRUCTION ---\nRespond strictly in language: {}.",
            self.language
        ));
        parts.join("\n\n")
    }

    /// System message (specialist only) followed by the user message.
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(specialist) = self.specialist {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: specialist.prefix().to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: self.full_prompt(),
        });
        messages
    }

    /// Completion cap to put on the wire.
    pub fn effective_max_tokens(&self) -> Option<u32> {
        self.max_tokens.filter(|n| *n > 0)
    }
}

/// Provider answer plus accounting.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Completion {
    pub text: String,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub full_prompt: String,
}

impl Completion {
    pub fn total_tokens(&self) -> Option<u64> {
        Some(self.prompt_tokens? + self.completion_tokens?)
    }
}

/// A chat-completion backend.
///
/// [`OpenRouterProvider`](provider::openrouter::OpenRouterProvider) is the
/// production implementation; tests use the generated `MockLlmProvider`.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send one request and return the first choice.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;

    /// Short provider name for logs and history records.
    fn name(&self) -> &str;
}
