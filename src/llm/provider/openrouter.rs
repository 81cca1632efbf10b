use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::utils::{complete_endpoint, mask_api_key};
use crate::config::{ApiSettings, ConfigStore};
use crate::constants;
use crate::error::{AbError, Result};
use crate::llm::{ChatMessage, Completion, CompletionRequest, LlmProvider};

const PROVIDER_NAME: &str = "openrouter";

/// OpenRouter (OpenAI-compatible) chat completions client
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    chat_endpoint: String,
    models_endpoint: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    /// 推理模型有时把答案放在这里而 content 为空
    reasoning: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

/// One entry of `GET /models`.
///
/// Unknown fields are kept in `extra` so `--json` output is lossless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub context_length: Option<u64>,
    #[serde(default)]
    pub pricing: Option<Pricing>,
    #[serde(default)]
    pub architecture: Option<Architecture>,
    #[serde(default)]
    pub top_provider: Option<TopProvider>,
    #[serde(default)]
    pub supported_parameters: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Prices are decimal strings in USD per token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub completion: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Architecture {
    #[serde(default)]
    pub modality: Option<String>,
    #[serde(default)]
    pub input_modalities: Vec<String>,
    #[serde(default)]
    pub output_modalities: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopProvider {
    #[serde(default)]
    pub max_completion_tokens: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Pricing {
    fn parse(value: &Option<String>) -> Option<f64> {
        match value.as_deref() {
            None | Some("") => Some(0.0),
            Some(raw) => raw.parse().ok(),
        }
    }

    /// Prompt price per token; `None` when the value is not a number.
    pub fn prompt_per_token(&self) -> Option<f64> {
        Self::parse(&self.prompt)
    }

    pub fn completion_per_token(&self) -> Option<f64> {
        Self::parse(&self.completion)
    }

    pub fn is_free(&self) -> bool {
        self.prompt_per_token() == Some(0.0) && self.completion_per_token() == Some(0.0)
    }
}

impl ModelInfo {
    pub fn is_free(&self) -> bool {
        self.pricing.as_ref().is_some_and(Pricing::is_free)
    }

    /// Input modalities joined by `", "`; falls back to `modality`, then `text`.
    pub fn modalities(&self) -> String {
        match &self.architecture {
            Some(arch) if !arch.input_modalities.is_empty() => arch.input_modalities.join(", "),
            Some(Architecture {
                modality: Some(m), ..
            }) if !m.is_empty() => m.clone(),
            _ => "text".to_string(),
        }
    }
}

impl OpenRouterProvider {
    /// Build from `global.*`, reading the key from the variable named by
    /// `global.api_key_env`.
    pub fn from_config(config: &ConfigStore) -> Result<Self> {
        Self::new(&config.api_settings())
    }

    pub fn new(settings: &ApiSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AbError::MissingCredential(settings.api_key_env.clone()))?;
        Self::with_api_key(settings, api_key)
    }

    /// Build with an explicit key, skipping the environment lookup.
    pub fn with_api_key(settings: &ApiSettings, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        tracing::debug!(
            "OpenRouter client: base={}, key={}",
            settings.api_base,
            mask_api_key(&api_key)
        );

        Ok(Self {
            client: super::create_http_client(settings.timeout_seconds)?,
            api_key,
            chat_endpoint: complete_endpoint(
                &settings.api_base,
                constants::llm::CHAT_COMPLETIONS_SUFFIX,
            ),
            models_endpoint: complete_endpoint(&settings.api_base, constants::llm::MODELS_SUFFIX),
        })
    }

    /// `GET /models`
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        tracing::debug!("OpenRouter models request: {}", self.models_endpoint);

        let response = self
            .client
            .get(&self.models_endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let response_text = response.text().await?;
        tracing::debug!("OpenRouter models response status: {}", status);

        if !status.is_success() {
            return Err(AbError::LlmApi {
                status: status.as_u16(),
                message: response_text,
            });
        }

        let body: ModelsResponse = serde_json::from_str(&response_text).map_err(|e| {
            AbError::Llm(format!(
                "Failed to parse OpenRouter models response: {}. Raw response: {}",
                e, response_text
            ))
        })?;
        Ok(body.data)
    }
}

fn map_transport_error(e: reqwest::Error) -> AbError {
    if e.is_timeout() {
        AbError::Llm(format!("Request timeout: {}", e))
    } else {
        AbError::Network(e)
    }
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let full_prompt = request.full_prompt();
        let payload = ChatRequest {
            model: &request.model,
            messages: request.messages(),
            max_tokens: request.effective_max_tokens(),
        };

        tracing::debug!(
            "OpenRouter API request: model={}, max_tokens={:?}, prompt_chars={}",
            request.model,
            payload.max_tokens,
            full_prompt.chars().count()
        );

        let response = self
            .client
            .post(&self.chat_endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let response_text = response.text().await?;

        tracing::debug!("OpenRouter API response status: {}", status);
        tracing::debug!("OpenRouter API response body: {}", response_text);

        if !status.is_success() {
            return Err(AbError::LlmApi {
                status: status.as_u16(),
                message: response_text,
            });
        }

        let body: ChatResponse = serde_json::from_str(&response_text).map_err(|e| {
            AbError::Llm(format!(
                "Failed to parse OpenRouter response: {}. Raw response: {}",
                e, response_text
            ))
        })?;

        let message = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| {
                AbError::Llm(format!(
                    "Failed to parse OpenRouter response: no choices. Raw response: {}",
                    response_text
                ))
            })?;

        let text = match message.content.filter(|c| !c.is_empty()) {
            Some(content) => content,
            None => {
                let reasoning = message.reasoning.unwrap_or_default();
                if !reasoning.is_empty() {
                    tracing::info!(
                        "Using reasoning field (model: {}, content was empty)",
                        request.model
                    );
                }
                reasoning
            }
        };

        let (prompt_tokens, completion_tokens) = body
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((None, None));

        Ok(Completion {
            text,
            provider: PROVIDER_NAME.to_string(),
            model: request.model.clone(),
            prompt_tokens,
            completion_tokens,
            full_prompt,
        })
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}
