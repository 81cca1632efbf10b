//! Per-call history records under `history.directory`
//!
//! 每次成功的 LLM 调用写一个 `history_*.json`，并更新 `index.json`。
//! 记录失败只打 warn 日志，不影响命令本身。

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::ConfigStore;
use crate::constants;
use crate::context::AssembledContext;
use crate::error::Result;
use crate::llm::{Completion, Specialist};

/// USD per one million tokens, `(key, prompt, completion)`.
const PRICING: &[(&str, f64, f64)] = &[
    ("gpt-4o", 2.50, 10.00),
    ("gpt-4o-mini", 0.15, 0.60),
    ("gpt-4-turbo", 10.00, 30.00),
    ("gpt-4", 30.00, 60.00),
    ("gpt-3.5-turbo", 0.50, 1.50),
    ("gemini-1.5-pro", 3.50, 10.50),
    ("gemini-1.5-flash", 0.075, 0.30),
    ("gemini-pro", 0.50, 1.50),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub timestamp: String,
    pub timestamp_formatted: String,
    pub prompt_hash: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u64>,
    pub response_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
    pub estimated_cost_usd: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilesInfo {
    pub processed_count: usize,
    pub error_count: usize,
    pub skipped_count: usize,
    pub total_words: usize,
    pub total_estimated_tokens: usize,
    pub file_list: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallConfiguration {
    pub command: String,
    pub specialist: Option<Specialist>,
    pub language: String,
    pub max_completion_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextStats {
    pub full: String,
    pub length_chars: usize,
    pub length_words: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub prompt: TextStats,
    pub response: TextStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub prompt_to_response_ratio: f64,
    pub avg_response_word_length: f64,
    pub response_lines: usize,
}

/// Full record written to `history_{timestamp}_{hash}.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub metadata: Metadata,
    pub provider_info: ProviderInfo,
    pub tokens: TokenUsage,
    pub files_info: FilesInfo,
    pub configuration: CallConfiguration,
    pub content: Content,
    pub statistics: Statistics,
}

/// One line of `index.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub session_id: String,
    pub timestamp: String,
    pub provider: String,
    pub model: String,
    pub tokens: Option<u64>,
    pub cost: f64,
    pub files_processed: usize,
    pub response_preview: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryIndex {
    pub created_at: String,
    /// 累计调用次数，不随清理减少
    pub total_interactions: usize,
    pub total_tokens_used: u64,
    pub total_estimated_cost: f64,
    /// 最新的在前，最多保留 `KEEP_LAST` 条
    pub interactions: Vec<IndexEntry>,
}

impl HistoryIndex {
    fn new(now: DateTime<Local>) -> Self {
        Self {
            created_at: now.to_rfc3339(),
            total_interactions: 0,
            total_tokens_used: 0,
            total_estimated_cost: 0.0,
            interactions: Vec::new(),
        }
    }
}

/// Call-site details that are not part of the [`Completion`].
#[derive(Debug, Clone)]
pub struct CallDetails<'a> {
    pub command: &'a str,
    pub specialist: Option<Specialist>,
    pub language: &'a str,
    pub max_completion_tokens: Option<u32>,
    pub files: Option<&'a AssembledContext>,
}

/// Writes history records into one directory.
#[derive(Debug, Clone)]
pub struct HistoryRecorder {
    dir: PathBuf,
    enabled: bool,
}

impl HistoryRecorder {
    pub fn new(dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            dir: dir.into(),
            enabled,
        }
    }

    pub fn from_config(config: &ConfigStore) -> Self {
        Self::new(config.history_dir(), config.history_enabled())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record one call. Never fails; problems are logged.
    pub fn record(&self, completion: &Completion, details: &CallDetails<'_>) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        match self.try_record(completion, details, Local::now()) {
            Ok(path) => {
                tracing::debug!("History saved: {}", path.display());
                Some(path)
            }
            Err(e) => {
                tracing::warn!("Could not save history: {}", e);
                None
            }
        }
    }

    fn try_record(
        &self,
        completion: &Completion,
        details: &CallDetails<'_>,
        now: DateTime<Local>,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let record = build_record(completion, details, now);
        let path = self.dir.join(format!(
            "{}{}.json",
            constants::history::FILE_PREFIX,
            record.metadata.session_id
        ));
        fs::write(&path, serde_json::to_string_pretty(&record)?)?;

        if let Err(e) = self.update_index(&record, now) {
            tracing::warn!("Could not update history index: {}", e);
        }
        if let Err(e) = self.prune(constants::history::KEEP_LAST) {
            tracing::warn!("Could not prune history: {}", e);
        }
        Ok(path)
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(constants::history::INDEX_FILE)
    }

    /// Read `index.json`; `None` when it does not exist.
    pub fn load_index(&self) -> Result<Option<HistoryIndex>> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn update_index(&self, record: &HistoryRecord, now: DateTime<Local>) -> Result<()> {
        let mut index = self.load_index()?.unwrap_or_else(|| HistoryIndex::new(now));

        index.interactions.insert(
            0,
            IndexEntry {
                session_id: record.metadata.session_id.clone(),
                timestamp: record.metadata.timestamp.clone(),
                provider: record.provider_info.provider.clone(),
                model: record.provider_info.model.clone(),
                tokens: record.tokens.total_tokens,
                cost: record.tokens.estimated_cost_usd,
                files_processed: record.files_info.processed_count,
                response_preview: record.content.response.preview.clone().unwrap_or_default(),
            },
        );
        index.total_interactions += 1;
        index.total_tokens_used += record.tokens.total_tokens.unwrap_or(0);
        index.total_estimated_cost =
            round6(index.total_estimated_cost + record.tokens.estimated_cost_usd);

        self.write_index(&index)
    }

    fn write_index(&self, index: &HistoryIndex) -> Result<()> {
        fs::write(self.index_path(), serde_json::to_string_pretty(index)?)?;
        Ok(())
    }

    /// Keep the newest `keep` record files and index entries.
    ///
    /// Returns how many record files were deleted.
    pub fn prune(&self, keep: usize) -> Result<usize> {
        let mut files = self.record_files()?;
        // 文件名里带时间戳，按名字倒序即按时间倒序
        files.sort_by(|a, b| b.cmp(a));
        let mut removed = 0;
        for old in files.iter().skip(keep) {
            fs::remove_file(old)?;
            removed += 1;
        }

        if let Some(mut index) = self.load_index()?
            && index.interactions.len() > keep
        {
            index.interactions.truncate(keep);
            self.write_index(&index)?;
        }
        Ok(removed)
    }

    /// Record files plus the index, i.e. what [`clear`](Self::clear) would delete.
    pub fn file_count(&self) -> Result<usize> {
        let index = usize::from(self.index_path().exists());
        Ok(self.record_files()?.len() + index)
    }

    /// Delete every record file and the index. Returns how many files went.
    pub fn clear(&self) -> Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let mut removed = 0;
        for path in self.record_files()? {
            fs::remove_file(path)?;
            removed += 1;
        }
        let index = self.index_path();
        if index.exists() {
            fs::remove_file(index)?;
            removed += 1;
        }
        Ok(removed)
    }

    fn record_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        if !self.dir.exists() {
            return Ok(files);
        }
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_record = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| {
                    n.starts_with(constants::history::FILE_PREFIX) && n.ends_with(".json")
                });
            if is_record {
                files.push(path);
            }
        }
        Ok(files)
    }
}

/// Estimated USD cost of a call. Unknown models cost 0.
pub fn estimate_cost(model: &str, prompt_tokens: Option<u64>, response_tokens: Option<u64>) -> f64 {
    let (Some(prompt), Some(response)) = (prompt_tokens, response_tokens) else {
        return 0.0;
    };
    let model = model.to_lowercase();
    let price = PRICING
        .iter()
        .filter(|(key, _, _)| model.contains(key))
        .max_by_key(|(key, _, _)| key.len());

    match price {
        Some((_, prompt_price, response_price)) => round6(
            prompt as f64 / 1_000_000.0 * prompt_price
                + response as f64 / 1_000_000.0 * response_price,
        ),
        None => 0.0,
    }
}

/// First 8 hex chars of the SHA-256 of `text`.
pub fn prompt_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..8].to_string()
}

fn build_record(
    completion: &Completion,
    details: &CallDetails<'_>,
    now: DateTime<Local>,
) -> HistoryRecord {
    let hash = prompt_hash(&completion.full_prompt);
    let session_id = format!("{}_{}", now.format("%Y%m%d_%H%M%S"), hash);
    let prompt = &completion.full_prompt;
    let response = &completion.text;

    let prompt_chars = prompt.chars().count();
    let response_chars = response.chars().count();
    let response_words = response.split_whitespace().count();

    let preview = if response_chars > constants::history::PREVIEW_CHARS {
        let head: String = response
            .chars()
            .take(constants::history::PREVIEW_CHARS)
            .collect();
        format!("{}...", head)
    } else {
        response.clone()
    };

    let files_info = details
        .files
        .map(|ctx| FilesInfo {
            processed_count: ctx.processed,
            error_count: ctx.errors,
            skipped_count: ctx.skipped,
            total_words: ctx.words,
            total_estimated_tokens: ctx.tokens,
            file_list: ctx.files.clone(),
        })
        .unwrap_or_default();

    HistoryRecord {
        metadata: Metadata {
            timestamp: now.to_rfc3339(),
            timestamp_formatted: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            prompt_hash: hash,
            session_id,
        },
        provider_info: ProviderInfo {
            provider: completion.provider.clone(),
            model: completion.model.clone(),
        },
        tokens: TokenUsage {
            prompt_tokens: completion.prompt_tokens,
            response_tokens: completion.completion_tokens,
            total_tokens: completion.total_tokens(),
            estimated_cost_usd: estimate_cost(
                &completion.model,
                completion.prompt_tokens,
                completion.completion_tokens,
            ),
        },
        files_info,
        configuration: CallConfiguration {
            command: details.command.to_string(),
            specialist: details.specialist,
            language: details.language.to_string(),
            max_completion_tokens: details.max_completion_tokens,
        },
        content: Content {
            prompt: TextStats {
                full: prompt.clone(),
                length_chars: prompt_chars,
                length_words: prompt.split_whitespace().count(),
                preview: None,
            },
            response: TextStats {
                full: response.clone(),
                length_chars: response_chars,
                length_words: response_words,
                preview: Some(preview),
            },
        },
        statistics: Statistics {
            prompt_to_response_ratio: if prompt_chars == 0 {
                0.0
            } else {
                round2(response_chars as f64 / prompt_chars as f64)
            },
            avg_response_word_length: round2(response_chars as f64 / response_words.max(1) as f64),
            response_lines: response.matches('\n').count() + 1,
        },
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn round6(x: f64) -> f64 {
    (x * 1_000_000.0).round() / 1_000_000.0
}
