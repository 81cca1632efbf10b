pub mod openrouter;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::Client;

use crate::config::ConfigStore;
use crate::error::{AbError, Result};
use crate::llm::LlmProvider;

/// 全局 HTTP 客户端（共享连接池）
static HTTP_CLIENT: OnceLock<Client> = OnceLock::new();

/// 获取或创建全局 HTTP 客户端
///
/// 第一次调用时的 timeout 决定整个进程的超时设置。
pub(crate) fn create_http_client(timeout_seconds: u64) -> Result<Client> {
    if let Some(client) = HTTP_CLIENT.get() {
        return Ok(client.clone());
    }

    // reqwest 使用 rustls-no-provider，需要先装好 ring provider；重复安装会失败，忽略即可
    let _ = rustls::crypto::ring::default_provider().install_default();

    let user_agent = format!(
        "{}/{} ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    );

    let client = Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .map_err(|e| AbError::Llm(format!("Failed to create HTTP client: {}", e)))?;

    Ok(HTTP_CLIENT.get_or_init(|| client).clone())
}

/// 根据配置创建 provider
///
/// 目前只有 OpenRouter；API key 缺失时在这里就失败，不会发出任何请求。
pub fn create_provider(config: &ConfigStore) -> Result<Box<dyn LlmProvider>> {
    let provider = openrouter::OpenRouterProvider::from_config(config)?;
    Ok(Box::new(provider))
}
