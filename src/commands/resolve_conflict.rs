use std::fs;
use std::path::{Path, PathBuf};

use colored::Colorize;

use super::options::ResolveConflictOptions;
use super::{LlmCall, ask};
use crate::config::ConfigStore;
use crate::constants;
use crate::error::{AbError, Result};
use crate::git::GitOperations;
use crate::git::repository::GitRepository;
use crate::llm::LlmProvider;
use crate::llm::prompt::{ConflictInput, conflict_prompt};
use crate::llm::provider::create_provider;
use crate::llm::provider::utils::strip_code_fences;
use crate::ui;

const COMMAND: &str = "resolve-conflict";

const OURS_MARKER: &str = "<<<<<<<";
const BASE_MARKER: &str = "|||||||";
const SPLIT_MARKER: &str = "=======";
const THEIRS_MARKER: &str = ">>>>>>>";

/// One `<<<<<<< ... >>>>>>>` block. Line numbers are 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictBlock {
    pub start_line: usize,
    pub end_line: usize,
    pub ours_label: String,
    pub ours: Vec<String>,
    pub theirs_label: String,
    pub theirs: Vec<String>,
}

/// 用户对单个冲突的处理
enum Decision {
    Apply,
    Skip,
    Edit,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolveSummary {
    pub resolved: usize,
    pub skipped: usize,
}

/// `ab git resolve-conflict`
pub async fn run(
    options: &ResolveConflictOptions,
    config: &ConfigStore,
    colored: bool,
) -> Result<()> {
    let repo = GitRepository::open()?;
    let provider = create_provider(config)?;
    run_internal(options, config, &repo, provider.as_ref(), colored)
        .await
        .map(|_| ())
}

pub async fn run_internal(
    options: &ResolveConflictOptions,
    config: &ConfigStore,
    git: &dyn GitOperations,
    llm: &dyn LlmProvider,
    colored: bool,
) -> Result<ResolveSummary> {
    let language = config.language(Some(COMMAND), options.language.as_deref());

    let files: Vec<PathBuf> = match &options.file {
        Some(file) => {
            if !file.exists() {
                return Err(AbError::InvalidInput(format!(
                    "File not found: {}",
                    file.display()
                )));
            }
            vec![file.clone()]
        }
        None => {
            let root = git.root();
            git.conflicted_files()?
                .into_iter()
                .map(|f| root.join(f))
                .collect()
        }
    };

    if files.is_empty() {
        ui::warning("No conflicted files found", colored);
        return Ok(ResolveSummary::default());
    }
    ui::info(&format!("Found {} file(s) with conflicts", files.len()), colored);

    let mut summary = ResolveSummary::default();
    for file in &files {
        if let Err(e) =
            resolve_file(file, options, config, llm, &language, &mut summary, colored).await
        {
            match e {
                AbError::UserCancelled | AbError::MissingCredential(_) => return Err(e),
                other => ui::error(&format!("{}: {}", file.display(), other), colored),
            }
        }
    }

    println!();
    ui::info(
        &format!(
            "Summary: {} resolved, {} skipped",
            summary.resolved, summary.skipped
        ),
        colored,
    );
    if summary.resolved > 0 {
        ui::info(
            "Run 'git add' on resolved files, then 'git commit' to complete the merge",
            colored,
        );
    }
    Ok(summary)
}

async fn resolve_file(
    file: &Path,
    options: &ResolveConflictOptions,
    config: &ConfigStore,
    llm: &dyn LlmProvider,
    language: &str,
    summary: &mut ResolveSummary,
    colored: bool,
) -> Result<()> {
    let mut content = fs::read_to_string(file)?;
    let total = parse_conflicts(&content).len();
    if total == 0 {
        ui::info(&format!("No conflicts in {}", file.display()), colored);
        return Ok(());
    }
    ui::info(
        &format!("Processing {}: {} conflict(s)", file.display(), total),
        colored,
    );

    // 应用后重新解析，已解决的块消失，index 指向下一个未处理的块
    let mut index = 0;
    let mut number = 0;
    loop {
        let conflicts = parse_conflicts(&content);
        let Some(conflict) = conflicts.get(index) else {
            break;
        };
        number += 1;
        ui::info(
            &format!("Resolving conflict {}/{} in {}...", number, total, file.display()),
            colored,
        );

        let resolved = match suggest_resolution(file, &content, conflict, config, llm, language)
            .await
        {
            Ok(resolved) if !resolved.is_empty() => resolved,
            Ok(_) => {
                ui::warning(
                    &format!("Could not resolve conflict {} in {}", number, file.display()),
                    colored,
                );
                summary.skipped += 1;
                index += 1;
                continue;
            }
            Err(AbError::MissingCredential(var)) => return Err(AbError::MissingCredential(var)),
            Err(e) => {
                ui::warning(&format!("Could not resolve conflict {}: {}", number, e), colored);
                summary.skipped += 1;
                index += 1;
                continue;
            }
        };

        display_resolution(file, conflict, &resolved, colored);

        if options.dry_run {
            ui::info("Dry run - not applying changes", colored);
            index += 1;
            continue;
        }

        let decision = if options.yes {
            Decision::Apply
        } else {
            match ui::select("Apply this resolution?", &["Apply", "Skip", "Edit file"], 0)? {
                0 => Decision::Apply,
                1 => Decision::Skip,
                _ => Decision::Edit,
            }
        };

        match decision {
            Decision::Apply => {
                content = apply_resolution(&content, conflict, &resolved);
                fs::write(file, &content)?;
                ui::success(&format!("Applied resolution to {}", file.display()), colored);
                summary.resolved += 1;
            }
            Decision::Skip => {
                ui::info("Skipped", colored);
                summary.skipped += 1;
                index += 1;
            }
            Decision::Edit => {
                ui::info("Opening file in editor...", colored);
                ui::edit_file(file)?;
                summary.skipped += 1;
                // 手动编辑后行号不再可信
                ui::info(
                    &format!("Leaving the rest of {} to manual editing", file.display()),
                    colored,
                );
                break;
            }
        }
    }
    Ok(())
}

async fn suggest_resolution(
    file: &Path,
    content: &str,
    conflict: &ConflictBlock,
    config: &ConfigStore,
    llm: &dyn LlmProvider,
    language: &str,
) -> Result<String> {
    let (before, after) =
        surrounding_context(content, conflict, constants::git::CONFLICT_CONTEXT_LINES);
    let ours = conflict.ours.join("\n");
    let theirs = conflict.theirs.join("\n");
    let file_name = file.display().to_string();

    let prompt = conflict_prompt(&ConflictInput {
        file: &file_name,
        start_line: conflict.start_line,
        end_line: conflict.end_line,
        before: &before,
        ours_label: &conflict.ours_label,
        ours: &ours,
        theirs_label: &conflict.theirs_label,
        theirs: &theirs,
        after: &after,
    });

    let completion = ask(
        llm,
        config,
        LlmCall::new(COMMAND, prompt, language).with_spinner("Waiting for the model..."),
    )
    .await?;
    Ok(strip_code_fences(&completion.text))
}

/// Parse every complete conflict block. Blocks without a closing marker are ignored.
pub fn parse_conflicts(content: &str) -> Vec<ConflictBlock> {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut conflicts = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if !lines[i].starts_with(OURS_MARKER) {
            i += 1;
            continue;
        }

        let start = i;
        let ours_label = marker_label(lines[i], OURS_MARKER, "HEAD");
        let mut ours = Vec::new();
        let mut theirs = Vec::new();
        i += 1;

        while i < lines.len()
            && !lines[i].starts_with(SPLIT_MARKER)
            && !lines[i].starts_with(BASE_MARKER)
        {
            ours.push(lines[i].to_string());
            i += 1;
        }
        // diff3 的 base 段不参与合并
        while i < lines.len() && !lines[i].starts_with(SPLIT_MARKER) {
            i += 1;
        }
        i += 1;
        while i < lines.len() && !lines[i].starts_with(THEIRS_MARKER) {
            theirs.push(lines[i].to_string());
            i += 1;
        }

        if i >= lines.len() {
            tracing::debug!("Unterminated conflict starting at line {}", start + 1);
            break;
        }

        conflicts.push(ConflictBlock {
            start_line: start + 1,
            end_line: i + 1,
            ours_label,
            ours,
            theirs_label: marker_label(lines[i], THEIRS_MARKER, "incoming"),
            theirs,
        });
        i += 1;
    }

    conflicts
}

fn marker_label(line: &str, marker: &str, fallback: &str) -> String {
    let label = line.trim_start_matches(marker).trim();
    if label.is_empty() {
        fallback.to_string()
    } else {
        label.to_string()
    }
}

/// Up to `lines` lines before and after the block.
pub fn surrounding_context(
    content: &str,
    conflict: &ConflictBlock,
    lines: usize,
) -> (String, String) {
    let all: Vec<&str> = content.split('\n').collect();
    let before_start = (conflict.start_line - 1).saturating_sub(lines);
    let before = all[before_start..conflict.start_line - 1].join("\n");
    let after_end = (conflict.end_line + lines).min(all.len());
    let after = all[conflict.end_line.min(all.len())..after_end].join("\n");
    (before, after)
}

/// Replace lines `start_line..=end_line` with `resolved`.
pub fn apply_resolution(content: &str, conflict: &ConflictBlock, resolved: &str) -> String {
    let mut lines: Vec<&str> = content.split('\n').collect();
    let replacement: Vec<&str> = resolved.split('\n').collect();
    lines.splice(conflict.start_line - 1..conflict.end_line, replacement);
    lines.join("\n")
}

fn display_resolution(file: &Path, conflict: &ConflictBlock, resolved: &str, colored: bool) {
    let title = format!(
        "=== CONFLICT IN {} (lines {}-{}) ===",
        file.display(),
        conflict.start_line,
        conflict.end_line
    );
    let sections = [
        ("--- OUR VERSION ---", conflict.ours.join("\n"), "red"),
        ("--- THEIR VERSION ---", conflict.theirs.join("\n"), "yellow"),
        ("--- PROPOSED RESOLUTION ---", resolved.to_string(), "green"),
    ];

    println!();
    if colored {
        println!("{}", title.cyan());
    } else {
        println!("{}", title);
    }
    for (header, body, color) in sections {
        println!();
        if colored {
            println!("{}", header.color(color));
        } else {
            println!("{}", header);
        }
        println!("{}", body);
    }
    println!();
}
