//! Provider utility functions
//!
//! URL joining, key masking and response clean-up shared by the client
//! and the commands.

/// Append `suffix` to `base_url` unless it is already there.
///
/// # Example
/// ```
/// use ab_cli::llm::provider::utils::complete_endpoint;
///
/// assert_eq!(
///     complete_endpoint("https://openrouter.ai/api/v1", "/chat/completions"),
///     "https://openrouter.ai/api/v1/chat/completions"
/// );
/// assert_eq!(
///     complete_endpoint("https://openrouter.ai/api/v1/", "/models"),
///     "https://openrouter.ai/api/v1/models"
/// );
/// assert_eq!(
///     complete_endpoint("http://proxy.local/v1/chat/completions", "/chat/completions"),
///     "http://proxy.local/v1/chat/completions"
/// );
/// ```
pub fn complete_endpoint(base_url: &str, suffix: &str) -> String {
    let url = base_url.trim_end_matches('/');
    let suffix = suffix.trim_start_matches('/');

    if url.ends_with(suffix) {
        return url.to_string();
    }
    format!("{}/{}", url, suffix)
}

/// Mask an API key for logging.
///
/// # Example
/// ```
/// use ab_cli::llm::provider::utils::mask_api_key;
///
/// assert_eq!(mask_api_key("sk-or-v1-abcdefgh"), "sk-o...efgh");
/// assert_eq!(mask_api_key("short"), "****");
/// ```
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        "****".to_string()
    }
}

/// Remove a surrounding Markdown code fence, if any.
///
/// Only the outer fence is removed; the language tag on the opening line
/// is dropped with it.
///
/// # Example
/// ```
/// use ab_cli::llm::provider::utils::strip_code_fences;
///
/// assert_eq!(strip_code_fences("```bash\necho hi\n```"), "echo hi");
/// assert_eq!(strip_code_fences("plain"), "plain");
/// ```
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let mut lines: Vec<&str> = trimmed.lines().collect();
    lines.remove(0);
    if lines.last().is_some_and(|l| l.trim() == "```") {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}
