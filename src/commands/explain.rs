use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use colored::Colorize;
use regex::Regex;

use super::options::ExplainOptions;
use super::{LlmCall, ask};
use crate::config::ConfigStore;
use crate::constants::explain as limits;
use crate::context::directory_listing;
use crate::error::{AbError, Result};
use crate::llm::LlmProvider;
use crate::llm::prompt::{ExplainInput, explain_prompt};
use crate::llm::provider::create_provider;
use crate::ui;

const COMMAND: &str = "explain";

/// Variables worth showing when explaining an error.
const ENV_EXCERPT: &[&str] = &["PATH", "PYTHONPATH", "NODE_PATH", "HOME", "PWD"];

const ERROR_INDICATORS: &[&str] = &[
    "error",
    "Error",
    "ERROR",
    "exception",
    "Exception",
    "EXCEPTION",
    "failed",
    "Failed",
    "FAILED",
    "Traceback",
    "traceback",
    "undefined",
    "not found",
    "not defined",
    "permission denied",
    "Permission denied",
    "No such file",
    "no such file",
];

static FILE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s:]+\.[a-z]{1,4}:\d+(-\d+)?$").expect("valid regex")
});

static FILE_REFERENCES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"'([^']+\.[a-z]{1,4})'",
        r#""([^"]+\.[a-z]{1,4})""#,
        r#"File "([^"]+)""#,
        r"in (\S+\.[a-z]{1,4})",
        r"from (\S+\.[a-z]{1,4})",
        r"(\S+\.[a-z]{1,4}):\d+",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// What the user asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    File,
    /// `path:line` or `path:start-end`
    FileLine,
    Error,
    Concept,
}

/// `ab util explain`
pub async fn run(options: &ExplainOptions, config: &ConfigStore, colored: bool) -> Result<()> {
    let provider = create_provider(config)?;
    run_internal(options, config, provider.as_ref(), colored).await
}

pub async fn run_internal(
    options: &ExplainOptions,
    config: &ConfigStore,
    llm: &dyn LlmProvider,
    colored: bool,
) -> Result<()> {
    let (input, kind) = match (&options.concept, options.input.as_deref()) {
        (Some(concept), _) => (concept.clone(), InputKind::Concept),
        (None, Some("-")) => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            let text = buf.trim().to_string();
            let kind = detect_input_kind(&text);
            (text, kind)
        }
        (None, Some(text)) => (text.to_string(), detect_input_kind(text)),
        (None, None) => {
            return Err(AbError::InvalidInput(
                "Nothing to explain. Pass a file, file:line, an error message, or --concept"
                    .to_string(),
            ));
        }
    };
    if input.is_empty() {
        return Err(AbError::InvalidInput("Input is empty".to_string()));
    }
    tracing::debug!("Explain input kind: {:?}", kind);

    let (main_content, question) = describe_input(&input, kind)?;

    // 错误信息默认带上最近的命令
    let history_lines = match (kind, options.history) {
        (_, Some(n)) => n,
        (InputKind::Error, None) => limits::ERROR_HISTORY_LINES,
        _ => 0,
    };
    let context = build_context(options, &input, kind, history_lines);

    let language = config.language(Some(COMMAND), options.language.as_deref());
    let prompt = explain_prompt(&ExplainInput {
        main_content: &main_content,
        context: &context,
        question: &question,
        detailed: options.detailed,
    });

    ui::info("Generating explanation...", colored);
    let completion = ask(
        llm,
        config,
        LlmCall::new(COMMAND, prompt, language).with_spinner("Waiting for the model..."),
    )
    .await?;
    tracing::info!("Using model: {}", completion.model);

    let explanation = completion.text.trim();
    if explanation.is_empty() {
        ui::warning("No explanation generated", colored);
        return Ok(());
    }

    println!();
    if colored {
        println!("{}", "=== EXPLANATION ===".green());
    } else {
        println!("=== EXPLANATION ===");
    }
    println!("{}", explanation);
    println!();
    Ok(())
}

pub fn detect_input_kind(text: &str) -> InputKind {
    if FILE_LINE.is_match(text) {
        InputKind::FileLine
    } else if Path::new(text).is_file() {
        InputKind::File
    } else if ERROR_INDICATORS.iter().any(|i| text.contains(i)) {
        InputKind::Error
    } else {
        InputKind::Concept
    }
}

/// `(main content, question)`
fn describe_input(input: &str, kind: InputKind) -> Result<(String, String)> {
    Ok(match kind {
        InputKind::File => (
            format!(
                "=== FILE: {} ===\n{}",
                input,
                read_file_with_context(Path::new(input), None, None)
            ),
            format!("Explain what this code in '{}' does.", input),
        ),
        InputKind::FileLine => {
            let (path, start, end) = parse_file_reference(input)?;
            let content = read_file_with_context(&path, Some(start), end);
            let question = match end {
                Some(end) => format!(
                    "Explain lines {}-{} in '{}'. Focus on the marked lines (>>>).",
                    start,
                    end,
                    path.display()
                ),
                None => format!(
                    "Explain line {} in '{}'. Focus on the marked line (>>>).",
                    start,
                    path.display()
                ),
            };
            (format!("=== FILE: {} ===\n{}", path.display(), content), question)
        }
        InputKind::Error => (
            format!("=== ERROR MESSAGE ===\n{}", input),
            "Explain this error and suggest how to fix it.".to_string(),
        ),
        InputKind::Concept => (
            format!("=== CONCEPT ===\n{}", input),
            format!("Explain the concept: {}", input),
        ),
    })
}

/// `path:line` or `path:start-end`.
pub fn parse_file_reference(reference: &str) -> Result<(PathBuf, usize, Option<usize>)> {
    let invalid = || AbError::InvalidInput(format!("Invalid file reference '{}'", reference));
    let (path, lines) = reference.rsplit_once(':').ok_or_else(invalid)?;

    let (start, end) = match lines.split_once('-') {
        Some((start, end)) => (
            start.parse().map_err(|_| invalid())?,
            Some(end.parse().map_err(|_| invalid())?),
        ),
        None => (lines.parse().map_err(|_| invalid())?, None),
    };
    Ok((PathBuf::from(path), start, end))
}

/// Whole file (first 200 lines), or the focused lines marked with `>>>`
/// and ten lines around them.
pub fn read_file_with_context(path: &Path, line: Option<usize>, end_line: Option<usize>) -> String {
    if !path.exists() {
        return format!("Error: File '{}' not found", path.display());
    }
    let content = match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
        Err(e) => return format!("Error reading file: {}", e),
    };
    let lines: Vec<&str> = content.lines().collect();
    let total = lines.len();

    let Some(line) = line else {
        if total > limits::MAX_FILE_LINES {
            return format!(
                "{}\n\n... (truncated, {} more lines)",
                lines[..limits::MAX_FILE_LINES].join("\n"),
                total - limits::MAX_FILE_LINES
            );
        }
        return content;
    };

    let last = end_line.unwrap_or(line);
    let start = line.saturating_sub(limits::CONTEXT_LINES + 1);
    let end = (last + limits::CONTEXT_LINES).min(total);

    (start..end)
        .map(|i| {
            let number = i + 1;
            let marker = if (line..=last).contains(&number) { ">>>" } else { "   " };
            format!("{} {:4}: {}", marker, number, lines[i])
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Existing files mentioned in an error message, first mention first.
pub fn extract_file_references(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for pattern in FILE_REFERENCES.iter() {
        for caps in pattern.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                let candidate = m.as_str().to_string();
                if Path::new(&candidate).is_file() && !found.contains(&candidate) {
                    found.push(candidate);
                }
            }
        }
    }
    found
}

fn build_context(
    options: &ExplainOptions,
    input: &str,
    kind: InputKind,
    history_lines: usize,
) -> String {
    let mut parts = Vec::new();

    if history_lines > 0 {
        let history = bash_history(history_lines);
        if !history.is_empty() {
            parts.push(format!(
                "=== RECENT BASH COMMANDS (last {}) ===\n{}",
                history_lines, history
            ));
        }
    }

    if options.with_files {
        let dir = options
            .context_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let listing = directory_listing(&dir);
        if !listing.is_empty() {
            parts.push(format!(
                "=== DIRECTORY LISTING ({}) ===\n{}",
                dir.display(),
                listing
            ));
        }

        if kind == InputKind::Error {
            for file in extract_file_references(input)
                .iter()
                .take(limits::MAX_REFERENCED_FILES)
            {
                parts.push(format!(
                    "=== FILE: {} ===\n{}",
                    file,
                    read_file_with_context(Path::new(file), None, None)
                ));
            }

            let env: Vec<String> = ENV_EXCERPT
                .iter()
                .filter_map(|var| std::env::var(var).ok().map(|v| format!("{}={}", var, v)))
                .collect();
            if !env.is_empty() {
                parts.push(format!("=== ENVIRONMENT ===\n{}", env.join("\n")));
            }
        }
    }

    parts.join("\n\n")
}

/// Last `lines` entries of `$HISTFILE` (default `~/.bash_history`).
fn bash_history(lines: usize) -> String {
    let path = std::env::var_os("HISTFILE").map(PathBuf::from).or_else(|| {
        directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".bash_history"))
    });
    let Some(path) = path else {
        return String::new();
    };
    match fs::read(&path) {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            let all: Vec<&str> = text.lines().collect();
            all[all.len().saturating_sub(lines)..].join("\n").trim().to_string()
        }
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::test_utils::test_config;
    use crate::llm::{Completion, MockLlmProvider};
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_detect_input_kind() {
        assert_eq!(detect_input_kind("main.rs:42"), InputKind::FileLine);
        assert_eq!(detect_input_kind("lib.py:10-20"), InputKind::FileLine);
        assert_eq!(
            detect_input_kind("Error: ECONNREFUSED 127.0.0.1:5432"),
            InputKind::Error
        );
        assert_eq!(detect_input_kind("dependency injection"), InputKind::Concept);

        let dir = TempDir::new().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, "x").unwrap();
        assert_eq!(detect_input_kind(file.to_str().unwrap()), InputKind::File);
    }

    #[test]
    fn test_parse_file_reference() {
        assert_eq!(
            parse_file_reference("src/a.rs:10-20").unwrap(),
            (PathBuf::from("src/a.rs"), 10, Some(20))
        );
        assert_eq!(
            parse_file_reference("a.rs:7").unwrap(),
            (PathBuf::from("a.rs"), 7, None)
        );
        assert!(parse_file_reference("a.rs:x").is_err());
    }

    #[test]
    fn test_read_file_with_context_marks_lines() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        let content: Vec<String> = (1..=30).map(|i| format!("line {}", i)).collect();
        fs::write(&file, content.join("\n")).unwrap();

        let out = read_file_with_context(&file, Some(15), Some(16));
        let rows: Vec<&str> = out.lines().collect();
        assert_eq!(rows.len(), 22);
        assert_eq!(rows[0], "       5: line 5");
        assert!(rows.contains(&">>>   15: line 15"));
        assert!(rows.contains(&">>>   16: line 16"));
        assert_eq!(*rows.last().unwrap(), "      26: line 26");

        let start = read_file_with_context(&file, Some(1), None);
        assert!(start.starts_with(">>>    1: line 1"));
    }

    #[test]
    fn test_read_whole_file_is_capped() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("big.txt");
        let content: Vec<String> = (1..=250).map(|i| i.to_string()).collect();
        fs::write(&file, content.join("\n")).unwrap();

        let out = read_file_with_context(&file, None, None);
        assert!(out.ends_with("... (truncated, 50 more lines)"));
        assert!(
            read_file_with_context(&dir.path().join("nope"), None, None).starts_with("Error: File")
        );
    }

    #[test]
    fn test_extract_file_references_keeps_existing_only() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("app.py");
        fs::write(&file, "print(1)").unwrap();
        let path = file.to_str().unwrap();

        let text = format!(
            "Traceback:\n  File \"{}\", line 3\nNameError in missing.py",
            path
        );
        assert_eq!(extract_file_references(&text), vec![path.to_string()]);
    }

    #[tokio::test]
    #[serial]
    async fn test_error_input_includes_history() {
        let dir = TempDir::new().unwrap();
        let histfile = dir.path().join("history");
        let commands: Vec<String> = (1..=15).map(|i| format!("cmd{}", i)).collect();
        fs::write(&histfile, commands.join("\n")).unwrap();
        let original = std::env::var_os("HISTFILE");
        unsafe { std::env::set_var("HISTFILE", &histfile) };

        let config = test_config("http://127.0.0.1:9", "AB_UNUSED_KEY");
        let mut llm = MockLlmProvider::new();
        llm.expect_complete()
            .withf(|req| {
                req.prompt.contains("=== ERROR MESSAGE ===\nModuleNotFoundError: x")
                    && req.prompt.contains("(last 10)")
                    && req.prompt.contains("cmd6\n")
                    && !req.prompt.contains("cmd5\n")
            })
            .times(1)
            .returning(|_| {
                Ok(Completion {
                    text: "Install the module.".into(),
                    ..Default::default()
                })
            });

        let options = ExplainOptions {
            input: Some("ModuleNotFoundError: x".into()),
            ..Default::default()
        };
        let result = run_internal(&options, &config, &llm, false).await;

        match original {
            Some(v) => unsafe { std::env::set_var("HISTFILE", v) },
            None => unsafe { std::env::remove_var("HISTFILE") },
        }
        result.unwrap();
    }

    #[tokio::test]
    async fn test_missing_input_is_rejected() {
        let config = test_config("http://127.0.0.1:9", "AB_UNUSED_KEY");
        let llm = MockLlmProvider::new();
        let err = run_internal(&ExplainOptions::default(), &config, &llm, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AbError::InvalidInput(_)));
    }
}
