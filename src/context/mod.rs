//! File context assembly for `ab prompt`
//!
//! Walks the given files and directories, drops ignored and binary files,
//! and concatenates the rest into one bounded text blob.

pub mod ignore;

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::constants;
use crate::error::Result;
pub use ignore::IgnoreRules;

/// How each file header shows the file's path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathFormat {
    #[default]
    Full,
    Relative,
    NameOnly,
}

/// Size limits, in estimated tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextLimits {
    /// Whole context; `0` disables the cap.
    pub max_tokens: usize,
    /// Per file; `0` disables the cap.
    pub max_tokens_doc: usize,
}

/// The assembled context plus counters for the history record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledContext {
    pub text: String,
    pub processed: usize,
    pub errors: usize,
    pub skipped: usize,
    pub words: usize,
    pub tokens: usize,
    /// Inputs as given on the command line.
    pub files: Vec<String>,
    /// The whole blob was cut at `max_tokens`.
    pub truncated: bool,
}

/// Builds an [`AssembledContext`] from paths.
pub struct PromptAssembler {
    ignore: IgnoreRules,
    format: PathFormat,
    limits: ContextLimits,
    cwd: PathBuf,
}

impl PromptAssembler {
    pub fn new(ignore: IgnoreRules, format: PathFormat, limits: ContextLimits) -> Result<Self> {
        Ok(Self {
            ignore,
            format,
            limits,
            cwd: std::env::current_dir()?,
        })
    }

    /// Assemble context from `paths`. Missing paths are skipped with a warning.
    pub fn build(&self, paths: &[PathBuf]) -> AssembledContext {
        let mut ctx = AssembledContext {
            files: paths.iter().map(|p| p.display().to_string()).collect(),
            ..Default::default()
        };

        for path in paths {
            if path.is_file() {
                let name = path.file_name().map(PathBuf::from).unwrap_or_default();
                self.add_file(path, &name, &mut ctx);
            } else if path.is_dir() {
                tracing::info!("Processing directory: {}", path.display());
                self.add_dir(path, &mut ctx);
            } else {
                tracing::warn!("Path '{}' does not exist. Skipping", path.display());
            }
        }

        if self.limits.max_tokens > 0 {
            let max_chars = self.limits.max_tokens * constants::llm::CHARS_PER_TOKEN;
            let total_chars = ctx.text.chars().count();
            if total_chars > max_chars {
                tracing::warn!(
                    "Context with ~{} tokens exceeds limit of {}. Truncating",
                    total_chars / constants::llm::CHARS_PER_TOKEN,
                    self.limits.max_tokens
                );
                ctx.text = ctx.text.chars().take(max_chars).collect();
                ctx.truncated = true;
            }
        }

        ctx
    }

    fn add_dir(&self, root: &Path, ctx: &mut AssembledContext) {
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                if entry.file_type().is_dir() && entry.file_name() == ".git" {
                    return false;
                }
                let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
                !(entry.file_type().is_dir() && self.ignore.is_ignored(relative, true))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Cannot read directory entry: {}", e);
                    ctx.errors += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_path_buf();
            self.add_file(entry.path(), &relative, ctx);
        }
    }

    fn add_file(&self, path: &Path, relative: &Path, ctx: &mut AssembledContext) {
        if self.ignore.is_ignored(relative, false) {
            tracing::debug!("Ignored by .aiignore: {}", path.display());
            ctx.skipped += 1;
            return;
        }
        if is_binary_file(path) {
            tracing::debug!("Ignored (binary): {}", path.display());
            ctx.skipped += 1;
            return;
        }

        let shown = self.display_path(path);
        match fs::read(path) {
            Ok(bytes) => {
                let content = String::from_utf8_lossy(&bytes);
                let (block, words, tokens) =
                    render_file(&shown, &content, self.limits.max_tokens_doc);
                tracing::debug!(
                    "Processing file: {} ({} words, ~{} tokens)",
                    shown,
                    words,
                    tokens
                );
                ctx.text.push_str(&block);
                ctx.processed += 1;
                ctx.words += words;
                ctx.tokens += tokens;
            }
            Err(e) => {
                ctx.text.push_str(&format!(
                    "// error_processing_file=\"{}\"\n// Error: {}\n",
                    shown, e
                ));
                ctx.errors += 1;
            }
        }
    }

    fn display_path(&self, path: &Path) -> String {
        let absolute = path
            .canonicalize()
            .unwrap_or_else(|_| self.cwd.join(path));
        match self.format {
            PathFormat::Full => absolute.display().to_string(),
            PathFormat::NameOnly => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string()),
            PathFormat::Relative => {
                let cwd = self.cwd.canonicalize().unwrap_or_else(|_| self.cwd.clone());
                absolute
                    .strip_prefix(&cwd)
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| path.display().to_string())
            }
        }
    }
}

/// Render one file block. Returns `(block, words, estimated_tokens)`.
pub fn render_file(shown: &str, content: &str, max_tokens_doc: usize) -> (String, usize, usize) {
    let chars_per_token = constants::llm::CHARS_PER_TOKEN;
    let original_tokens = content.chars().count() / chars_per_token;

    let mut warning = String::new();
    let content = if max_tokens_doc > 0 && original_tokens > max_tokens_doc {
        warning = format!(
            "// warning_content_truncated=\"true\" original_token_count=\"{}\" new_token_count=\"{}\"\n",
            original_tokens, max_tokens_doc
        );
        tracing::warn!(
            "File '{}' was truncated to ~{} tokens",
            shown,
            max_tokens_doc
        );
        content.chars().take(max_tokens_doc * chars_per_token).collect::<String>()
    } else {
        content.to_string()
    };

    let words = content.split_whitespace().count();
    let tokens = content.chars().count() / chars_per_token;
    (
        format!("// filename=\"{}\"\n{}{}\n", shown, warning, content),
        words,
        tokens,
    )
}

/// NUL byte, or too many non-text bytes in the first few KiB.
pub fn is_binary_file(path: &Path) -> bool {
    let mut buf = vec![0u8; constants::context::BINARY_SNIFF_BYTES];
    let read = match File::open(path).and_then(|mut f| f.read(&mut buf)) {
        Ok(n) => n,
        // 读不了就当二进制跳过
        Err(_) => return true,
    };
    is_binary_bytes(&buf[..read])
}

pub fn is_binary_bytes(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return false;
    }
    if bytes.contains(&0) {
        return true;
    }
    let control = bytes
        .iter()
        .filter(|&&b| b < 0x20 && !matches!(b, b'\n' | b'\r' | b'\t' | 0x0c | 0x08 | 0x1b))
        .count();
    // 合法 UTF-8 只豁免高位字节；缓冲区末尾被截断的多字节字符也算合法
    let utf8 = match std::str::from_utf8(bytes) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    };
    let high = if utf8 {
        0
    } else {
        bytes.iter().filter(|&&b| b >= 0x80).count() / 2
    };
    (control + high) * 100 > bytes.len() * constants::context::BINARY_THRESHOLD_PERCENT
}

/// `ls -la` style listing of one directory, hidden entries included, sorted by name.
///
/// Unreadable directories give an empty string.
pub fn directory_listing(dir: &Path) -> String {
    let Ok(entries) = fs::read_dir(dir) else {
        return String::new();
    };

    let mut rows: Vec<(String, String)> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            let meta = fs::symlink_metadata(entry.path()).ok()?;
            let (kind, shown) = if meta.file_type().is_symlink() {
                ('l', name.clone())
            } else if meta.is_dir() {
                ('d', format!("{}/", name))
            } else {
                ('-', name.clone())
            };
            Some((name, format!("{} {:>10}  {}", kind, meta.len(), shown)))
        })
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));

    rows.into_iter()
        .map(|(_, row)| row)
        .collect::<Vec<_>>()
        .join("\n")
}
