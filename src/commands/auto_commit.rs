use colored::Colorize;

use super::branch_name::{sanitize_branch_name, suggest_branch_name};
use super::options::AutoCommitOptions;
use super::{LlmCall, ask};
use crate::config::ConfigStore;
use crate::constants;
use crate::error::{AbError, Result};
use crate::git::repository::GitRepository;
use crate::git::{GitOperations, StatusSummary, diff};
use crate::llm::LlmProvider;
use crate::llm::prompt::{BranchNameInput, commit_message_prompt};
use crate::llm::provider::create_provider;
use crate::llm::provider::utils::strip_code_fences;
use crate::ui;

const COMMAND: &str = "auto-commit";

/// 在受保护分支上用户的选择
#[derive(Debug, Clone, PartialEq, Eq)]
enum BranchChoice {
    Switch(String),
    Stay,
    Cancel,
}

/// `ab git auto-commit`
pub async fn run(options: &AutoCommitOptions, config: &ConfigStore, colored: bool) -> Result<()> {
    let repo = GitRepository::open()?;
    let provider = create_provider(config)?;
    run_internal(options, config, &repo, provider.as_ref(), colored).await
}

pub async fn run_internal(
    options: &AutoCommitOptions,
    config: &ConfigStore,
    git: &dyn GitOperations,
    llm: &dyn LlmProvider,
    colored: bool,
) -> Result<()> {
    ui::info("Checking for uncommitted changes...", colored);
    let status = git.status()?;
    if status.is_clean() {
        ui::warning("No changes to commit", colored);
        return Ok(());
    }
    print_status(&status, colored);

    if !status.modified.is_empty() || !status.untracked.is_empty() {
        if options.add_all {
            ui::info("Staging all files (--add)...", colored);
            git.stage_all()?;
        } else if ui::confirm("Stage all files?", false)? {
            ui::info("Staging files...", colored);
            git.stage_all()?;
        } else if status.staged.is_empty() {
            ui::warning("No files staged. Aborting.", colored);
            return Ok(());
        }
    }

    ui::info("Generating diff for analysis...", colored);
    let staged_diff = git.staged_diff()?;
    if staged_diff.trim().is_empty() {
        ui::warning("No staged changes to commit", colored);
        return Ok(());
    }
    ui::info(
        &ui::format_diff_stats(&diff::parse_diff_stats(&staged_diff), colored),
        colored,
    );

    // 空仓库没有历史，风格参考留空即可
    let recent = git
        .recent_commits(constants::git::RECENT_COMMITS)
        .unwrap_or_default();
    let name_status = git.staged_name_status()?;
    let language = config.language(Some(COMMAND), options.language.as_deref());

    if let Some(branch) = git.current_branch()?
        && is_protected(&branch)
    {
        ui::warning(&format!("You are on '{}' branch.", branch), colored);
        let suggestion =
            suggest_for_changes(llm, config, &staged_diff, &name_status, &language).await;
        match choose_branch(&branch, &suggestion, colored)? {
            BranchChoice::Switch(name) => {
                git.create_branch(&name, true)?;
                ui::success(&format!("Created and switched to '{}'", name), colored);
            }
            BranchChoice::Stay => ui::warning(&format!("Continuing on {}...", branch), colored),
            BranchChoice::Cancel => {
                ui::warning("Cancelled", colored);
                return Ok(());
            }
        }
    }

    ui::info("Generating commit message...", colored);
    let call = LlmCall::new(
        COMMAND,
        commit_message_prompt(&recent, &name_status, &staged_diff),
        &language,
    )
    .with_spinner("Waiting for the model...");
    let completion = ask(llm, config, call).await?;
    let message = strip_code_fences(&completion.text);
    if message.is_empty() {
        return Err(AbError::Llm(
            "Failed to generate commit message: empty response".to_string(),
        ));
    }

    println!();
    if colored {
        println!("{}", "Generated commit message:".green());
    } else {
        println!("Generated commit message:");
    }
    println!("{}", "-".repeat(40));
    println!("{}", message);
    println!("{}", "-".repeat(40));
    println!();

    if !options.yes && !ui::confirm("Confirm commit with this message?", true)? {
        ui::warning("Commit cancelled", colored);
        return Ok(());
    }

    ui::info("Committing...", colored);
    git.commit(&message)?;
    println!();
    ui::success("Commit successful!", colored);
    ui::info(&format!("Latest commit: {}", git.last_commit_summary()?), colored);
    Ok(())
}

fn is_protected(branch: &str) -> bool {
    let branch = branch.to_lowercase();
    constants::git::PROTECTED_BRANCHES.contains(&branch.as_str())
}

fn print_status(status: &StatusSummary, colored: bool) {
    println!();
    ui::info("Changes summary:", colored);
    let sections = [
        ("Staged:", &status.staged, "green"),
        ("Modified:", &status.modified, "yellow"),
        ("Untracked:", &status.untracked, "red"),
    ];
    for (title, files, color) in sections {
        if files.is_empty() {
            continue;
        }
        if colored {
            println!("{}", title.color(color));
        } else {
            println!("{}", title);
        }
        for file in files {
            println!("  {}", file);
        }
    }
    println!();
}

/// 建议失败时返回空字符串，由用户手动输入
async fn suggest_for_changes(
    llm: &dyn LlmProvider,
    config: &ConfigStore,
    staged_diff: &str,
    name_status: &str,
    language: &str,
) -> String {
    let description = format!("Changes in these files:\n{}", name_status);
    let preview = diff::preview(staged_diff, constants::git::BRANCH_DIFF_PREVIEW);
    let input = BranchNameInput {
        description: &description,
        ticket: None,
        forced_prefix: None,
        diff_preview: Some(&preview),
    };
    match suggest_branch_name(llm, config, COMMAND, &input, language).await {
        Ok(name) => name,
        Err(e) => {
            tracing::warn!("Branch name suggestion failed: {}", e);
            String::new()
        }
    }
}

fn choose_branch(current: &str, suggestion: &str, colored: bool) -> Result<BranchChoice> {
    let stay = format!("Continue on {} anyway", current);

    if !suggestion.is_empty() {
        println!();
        if colored {
            println!("{} {}", "Suggested branch name:".green(), suggestion.yellow());
        } else {
            println!("Suggested branch name: {}", suggestion);
        }
        println!();
        let options = [
            "Create branch and commit there (Recommended)",
            stay.as_str(),
            "Cancel",
        ];
        return Ok(match ui::select("Choice", &options, 0)? {
            0 => BranchChoice::Switch(suggestion.to_string()),
            1 => BranchChoice::Stay,
            _ => BranchChoice::Cancel,
        });
    }

    ui::warning("Could not suggest branch name", colored);
    let options = ["Enter branch name manually", stay.as_str(), "Cancel"];
    match ui::select("Choice", &options, 0)? {
        0 => {
            let name = sanitize_branch_name(&ui::text("Branch name:", None)?);
            if name.is_empty() {
                ui::warning("No branch name provided.", colored);
                Ok(BranchChoice::Cancel)
            } else {
                Ok(BranchChoice::Switch(name))
            }
        }
        1 => Ok(BranchChoice::Stay),
        _ => Ok(BranchChoice::Cancel),
    }
}
