//! Command option structs
//!
//! Built from the parsed CLI in `main.rs` and passed to each command's
//! `run()`. `None` means "not given on the command line"; the command then
//! falls back to the configuration.

use std::path::PathBuf;

use super::format::ModelSort;
use crate::context::PathFormat;
use crate::llm::Specialist;
use crate::llm::prompt::{ChangelogFormat, ScriptMode};

/// `ab prompt`
#[derive(Debug, Clone, Default)]
pub struct PromptOptions {
    pub paths: Vec<PathBuf>,
    /// Already read from stdin when the user passed `-`
    pub prompt: Option<String>,
    pub language: Option<String>,
    pub max_tokens: Option<i64>,
    pub max_tokens_doc: Option<i64>,
    pub specialist: Option<Specialist>,
    pub model: Option<String>,
    pub max_completion_tokens: Option<i64>,
    /// Do not send `max_tokens` at all
    pub unlimited: bool,
    pub set_default_model: Option<String>,
    pub only_output: bool,
    pub json: bool,
    pub path_format: PathFormat,
    pub output: Option<PathBuf>,
}

/// `ab git auto-commit`
#[derive(Debug, Clone, Default)]
pub struct AutoCommitOptions {
    pub yes: bool,
    pub add_all: bool,
    pub language: Option<String>,
}

/// `ab git branch-name`
#[derive(Debug, Clone, Default)]
pub struct BranchNameOptions {
    pub description: String,
    pub create: bool,
    pub prefix: Option<String>,
    pub language: Option<String>,
    pub yes: bool,
}

/// `ab git pr-description`
#[derive(Debug, Clone, Default)]
pub struct PrDescriptionOptions {
    pub base: Option<String>,
    pub create: bool,
    pub draft: bool,
    pub language: Option<String>,
    pub yes: bool,
}

/// `ab git changelog`
#[derive(Debug, Clone, Default)]
pub struct ChangelogOptions {
    pub range: Option<String>,
    pub format: ChangelogFormat,
    pub output: Option<PathBuf>,
    pub categorize: bool,
    pub language: Option<String>,
}

/// `ab git resolve-conflict`
#[derive(Debug, Clone, Default)]
pub struct ResolveConflictOptions {
    pub file: Option<PathBuf>,
    pub yes: bool,
    pub dry_run: bool,
    pub language: Option<String>,
}

/// `ab git rewrite-history`
#[derive(Debug, Clone, Default)]
pub struct RewriteHistoryOptions {
    pub range: Option<String>,
    pub dry_run: bool,
    pub force_all: bool,
    /// `Some` only when `--skip-merges` / `--include-merges` was given
    pub skip_merges: Option<bool>,
    /// `Some` only when `--smart` / `--no-smart` was given
    pub smart: Option<bool>,
    pub backup_name: Option<String>,
    pub yes: bool,
    pub language: Option<String>,
}

/// `ab util explain`
#[derive(Debug, Clone, Default)]
pub struct ExplainOptions {
    /// File, `file:line[-end]`, error text, or `-` for stdin
    pub input: Option<String>,
    pub concept: Option<String>,
    pub history: Option<usize>,
    pub with_files: bool,
    pub context_dir: Option<PathBuf>,
    pub language: Option<String>,
    pub detailed: bool,
}

/// `ab util gen-script`
#[derive(Debug, Clone, Default)]
pub struct GenScriptOptions {
    pub description: String,
    /// Script language (bash, python, ...)
    pub script_language: String,
    pub mode: ScriptMode,
    pub output: Option<PathBuf>,
    pub run: bool,
    pub language: Option<String>,
}

/// `ab util passgenerator`
#[derive(Debug, Clone)]
pub struct PassgenOptions {
    pub length: Option<i64>,
    pub count: usize,
    pub no_symbols: bool,
    pub no_ambiguous: bool,
}

/// `ab models list`
#[derive(Debug, Clone, Default)]
pub struct ModelsListOptions {
    pub free: bool,
    pub search: Option<String>,
    pub context_min: Option<u64>,
    pub modality: Option<String>,
    pub sort: ModelSort,
    /// `0` shows every match
    pub limit: usize,
    pub json: bool,
}
