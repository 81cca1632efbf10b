//! OpenRouter provider 集成测试（mockito 模拟 HTTP）
//!
//! 覆盖：
//! - API key 缺失时不发请求
//! - 请求体与鉴权头
//! - ask() 选模型并写历史记录
//! - API 错误状态码
//! - 模型列表解析与过滤

use std::env;

use ab_cli::commands::models::{find_model, select_models};
use ab_cli::commands::{LlmCall, ModelsListOptions, ask};
use ab_cli::config::{ConfigStore, ConfigValue};
use ab_cli::error::AbError;
use ab_cli::history::HistoryRecorder;
use ab_cli::llm::provider::create_provider;
use ab_cli::llm::provider::openrouter::OpenRouterProvider;
use ab_cli::llm::provider::test_utils::{ensure_crypto_provider, test_config};
use mockito::{Matcher, Server};
use pretty_assertions::assert_eq;
use serde_json::json;
use serial_test::serial;
use tempfile::TempDir;

const KEY_VAR: &str = "AB_IT_OPENROUTER_KEY";

struct EnvGuard {
    key: String,
    original: Option<String>,
}

impl EnvGuard {
    fn set(key: &str, value: Option<&str>) -> Self {
        let original = env::var(key).ok();
        // SAFETY: 测试通过 serial_test 串行执行
        match value {
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        Self {
            key: key.to_string(),
            original,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        // SAFETY: 同上
        match &self.original {
            Some(v) => unsafe { env::set_var(&self.key, v) },
            None => unsafe { env::remove_var(&self.key) },
        }
    }
}

/// test_config 加上一个真实的历史目录
fn config_with_history(api_base: &str, history: &TempDir) -> ConfigStore {
    let mut document = test_config(api_base, KEY_VAR).document().clone();
    document
        .insert_path("history.enabled", ConfigValue::Bool(true))
        .unwrap();
    document
        .insert_path(
            "history.directory",
            ConfigValue::from(history.path().to_string_lossy().as_ref()),
        )
        .unwrap();
    ConfigStore::from_document("unused-config.json", document)
}

const MODELS_BODY: &str = r#"{"data":[
    {"id":"vendor/big","name":"Big","context_length":1000000,
     "pricing":{"prompt":"0.000002","completion":"0.00001"},
     "architecture":{"input_modalities":["text","image"]}},
    {"id":"vendor/tiny:free","name":"Tiny","context_length":8192,
     "pricing":{"prompt":"0","completion":"0"},
     "architecture":{"input_modalities":["text"]}},
    {"id":"other/mid","name":"Mid","context_length":128000,
     "pricing":{"prompt":"0.0000005","completion":"0.0000015"}}
]}"#;

// ========== 鉴权 ==========

#[tokio::test]
#[serial]
async fn test_missing_key_fails_before_any_request() {
    ensure_crypto_provider();
    let _guard = EnvGuard::set(KEY_VAR, None);
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .expect(0)
        .create_async()
        .await;

    let result = create_provider(&test_config(&server.url(), KEY_VAR));
    match result {
        Err(AbError::MissingCredential(var)) => assert_eq!(var, KEY_VAR),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("provider created without a key"),
    }
    mock.assert_async().await;
}

#[tokio::test]
#[serial]
async fn test_blank_key_counts_as_missing() {
    ensure_crypto_provider();
    let _guard = EnvGuard::set(KEY_VAR, Some("   "));
    let config = test_config("http://127.0.0.1:9", KEY_VAR);
    assert!(matches!(
        OpenRouterProvider::from_config(&config),
        Err(AbError::MissingCredential(_))
    ));
}

// ========== chat completions ==========

#[tokio::test]
#[serial]
async fn test_ask_sends_selected_model_and_records_history() {
    ensure_crypto_provider();
    let _guard = EnvGuard::set(KEY_VAR, Some("sk-it-123"));
    let history = TempDir::new().unwrap();
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-it-123")
        .match_body(Matcher::PartialJson(json!({
            "model": "test/small",
            "max_tokens": 42
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"choices":[{"message":{"content":"Bom dia"}}],
                "usage":{"prompt_tokens":12,"completion_tokens":3}}"#,
        )
        .create_async()
        .await;

    let config = config_with_history(&server.url(), &history);
    let provider = create_provider(&config).unwrap();
    let mut call = LlmCall::new("prompt", "Say good morning", "pt-br");
    call.max_completion_tokens = Some(42);
    let completion = ask(provider.as_ref(), &config, call).await.unwrap();

    assert_eq!(completion.text, "Bom dia");
    assert_eq!(completion.model, "test/small");
    assert_eq!(completion.total_tokens(), Some(15));
    assert!(completion.full_prompt.contains("Respond strictly in language: pt-br."));
    mock.assert_async().await;

    let recorder = HistoryRecorder::from_config(&config);
    let index = recorder.load_index().unwrap().expect("index written");
    assert_eq!(index.total_interactions, 1);
    assert_eq!(index.total_tokens_used, 15);
    assert_eq!(index.interactions[0].model, "test/small");
    assert_eq!(index.interactions[0].provider, "openrouter");
    // 一个记录文件 + index.json
    assert_eq!(recorder.file_count().unwrap(), 2);
}

#[tokio::test]
#[serial]
async fn test_large_context_goes_to_large_model_without_cap() {
    ensure_crypto_provider();
    let _guard = EnvGuard::set(KEY_VAR, Some("sk-it-123"));
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJson(json!({"model": "test/large"})))
        .with_status(200)
        .with_body(r#"{"choices":[{"message":{"content":"summary"}}]}"#)
        .create_async()
        .await;

    let config = test_config(&server.url(), KEY_VAR);
    let provider = create_provider(&config).unwrap();
    let mut call = LlmCall::new("prompt", "Summarise", "en");
    // 约 1250 tokens，超过 medium 阈值 1000
    call.context = "word ".repeat(1000);
    let completion = ask(provider.as_ref(), &config, call).await.unwrap();

    assert_eq!(completion.text, "summary");
    assert_eq!(completion.total_tokens(), None);
    mock.assert_async().await;
}

#[tokio::test]
#[serial]
async fn test_api_error_status_is_reported() {
    ensure_crypto_provider();
    let _guard = EnvGuard::set(KEY_VAR, Some("sk-bad"));
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_body(r#"{"error":{"message":"No auth credentials found"}}"#)
        .create_async()
        .await;

    let config = test_config(&server.url(), KEY_VAR);
    let provider = create_provider(&config).unwrap();
    let err = ask(provider.as_ref(), &config, LlmCall::new("prompt", "hi", "en"))
        .await
        .unwrap_err();

    match err {
        AbError::LlmApi { status, message } => {
            assert_eq!(status, 401);
            assert!(message.contains("No auth credentials"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

// ========== 模型列表 ==========

#[tokio::test]
#[serial]
async fn test_list_models_then_filter() {
    ensure_crypto_provider();
    let _guard = EnvGuard::set(KEY_VAR, Some("sk-it-123"));
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/models")
        .match_header("authorization", "Bearer sk-it-123")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(MODELS_BODY)
        .create_async()
        .await;

    let provider = OpenRouterProvider::from_config(&test_config(&server.url(), KEY_VAR)).unwrap();
    let models = provider.list_models().await.unwrap();
    mock.assert_async().await;
    assert_eq!(models.len(), 3);

    let free = select_models(
        models.clone(),
        &ModelsListOptions {
            free: true,
            ..Default::default()
        },
    );
    let ids: Vec<&str> = free.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["vendor/tiny:free"]);

    let images = select_models(
        models.clone(),
        &ModelsListOptions {
            modality: Some("image".to_string()),
            ..Default::default()
        },
    );
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].id, "vendor/big");

    assert_eq!(find_model(&models, "mid").unwrap().id, "other/mid");
    assert!(find_model(&models, "vendor").is_err());
}

#[tokio::test]
#[serial]
async fn test_list_models_server_error() {
    ensure_crypto_provider();
    let _guard = EnvGuard::set(KEY_VAR, Some("sk-it-123"));
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/models")
        .with_status(503)
        .with_body("upstream unavailable")
        .create_async()
        .await;

    let provider = OpenRouterProvider::from_config(&test_config(&server.url(), KEY_VAR)).unwrap();
    let err = provider.list_models().await.unwrap_err();
    assert!(matches!(err, AbError::LlmApi { status: 503, .. }));
}
