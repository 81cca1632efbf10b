use std::collections::HashMap;

use colored::Colorize;

use super::changelog::clamped_range;
use super::options::RewriteHistoryOptions;
use super::{LlmCall, ask};
use crate::config::ConfigStore;
use crate::constants;
use crate::error::{AbError, Result};
use crate::git::repository::GitRepository;
use crate::git::rewrite::{backup_branch_name, create_backup, rewrite_messages};
use crate::git::{CommitInfo, GitOperations, diff};
use crate::llm::LlmProvider;
use crate::llm::prompt::{rewrite_classification_prompt, rewrite_message_prompt};
use crate::llm::provider::create_provider;
use crate::llm::provider::utils::strip_code_fences;
use crate::ui;

const COMMAND: &str = "rewrite-history";

/// One message that will be replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRewrite {
    pub hash: String,
    pub short_hash: String,
    pub old_message: String,
    pub new_message: String,
}

/// Result of the analysis phase; nothing has been written yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewritePlan {
    pub range: String,
    pub rewrites: Vec<PlannedRewrite>,
    pub skipped_merges: usize,
    pub kept: usize,
}

impl RewritePlan {
    pub fn replacements(&self) -> HashMap<String, String> {
        self.rewrites
            .iter()
            .map(|r| (r.hash.clone(), r.new_message.clone()))
            .collect()
    }
}

/// `ab git rewrite-history`
pub async fn run(
    options: &RewriteHistoryOptions,
    config: &ConfigStore,
    colored: bool,
) -> Result<()> {
    let repo = GitRepository::open()?;
    let provider = create_provider(config)?;
    let plan = plan(options, config, &repo, provider.as_ref(), colored).await?;

    if plan.rewrites.is_empty() {
        ui::info("No commit messages need rewriting", colored);
        return Ok(());
    }

    if options.dry_run {
        ui::info("Dry-run mode: no changes were made", colored);
        return Ok(());
    }

    if !options.yes
        && !ui::confirm(
            &format!("Rewrite {} commit message(s)?", plan.rewrites.len()),
            false,
        )?
    {
        ui::warning("Rewrite cancelled", colored);
        return Ok(());
    }

    let backup = backup_branch_name(options.backup_name.as_deref());
    create_backup(&repo, &backup)?;
    ui::success(&format!("Backup branch created: {}", backup), colored);

    match rewrite_messages(&repo, &plan.replacements())? {
        Some(result) => {
            ui::success(
                &format!("Rewrote {} commit(s)", result.rebuilt),
                colored,
            );
            ui::info(
                &format!(
                    "HEAD moved from {} to {}",
                    short(&result.old_head),
                    short(&result.new_head)
                ),
                colored,
            );
            ui::info(
                &format!("To undo: git reset --hard {}", backup),
                colored,
            );
        }
        None => ui::info("Nothing was rewritten", colored),
    }
    Ok(())
}

/// Decide which messages to replace and generate the new ones.
pub async fn plan(
    options: &RewriteHistoryOptions,
    config: &ConfigStore,
    git: &dyn GitOperations,
    llm: &dyn LlmProvider,
    colored: bool,
) -> Result<RewritePlan> {
    if git.has_uncommitted_changes()? {
        return Err(AbError::InvalidInput(
            "You have uncommitted changes. Commit or stash them before rewriting history."
                .to_string(),
        ));
    }
    if git.is_empty()? {
        ui::warning("No commits found in specified range", colored);
        return Ok(RewritePlan::default());
    }

    let range = match options.range.as_deref() {
        Some(range) => range.to_string(),
        None => clamped_range(git.commit_count()?, constants::git::REWRITE_DEFAULT_DEPTH),
    };
    let skip_merges = config
        .command_bool(COMMAND, "skip_merges", options.skip_merges)
        .unwrap_or(true);
    let smart = config
        .command_bool(COMMAND, "smart_mode", options.smart)
        .unwrap_or(true);
    let language = config.language(Some(COMMAND), options.language.as_deref());

    let commits = git.commits_in_range(&range)?;
    let mut plan = RewritePlan {
        range: range.clone(),
        ..Default::default()
    };
    if commits.is_empty() {
        ui::warning("No commits found in specified range", colored);
        return Ok(plan);
    }
    ui::info(
        &format!("Analyzing {} commit(s) in {}", commits.len(), range),
        colored,
    );
    warn_if_pushed(git, &commits, colored)?;

    if options.dry_run {
        ui::info("Dry-run mode", colored);
    }

    for commit in &commits {
        if commit.is_merge() && skip_merges {
            ui::info(
                &format!("Skipping merge commit {}", commit.short_hash),
                colored,
            );
            plan.skipped_merges += 1;
            continue;
        }

        let files = git.commit_files(&commit.hash)?;
        let patch = diff::preview(
            &git.commit_diff(&commit.hash)?,
            constants::git::REWRITE_DIFF_PREVIEW,
        );

        let needs_rewrite = if options.force_all {
            true
        } else if smart {
            classify(llm, config, commit, &files, &patch, &language).await?
        } else {
            is_too_short(&commit.message)
        };
        if !needs_rewrite {
            tracing::debug!("Keeping message of {}", commit.short_hash);
            plan.kept += 1;
            continue;
        }

        let call = LlmCall::new(
            COMMAND,
            rewrite_message_prompt(&commit.message, &files, &patch),
            &language,
        )
        .with_spinner("Rewriting commit message...");
        let new_message = strip_code_fences(&ask(llm, config, call).await?.text);
        if new_message.is_empty() || new_message == commit.message {
            plan.kept += 1;
            continue;
        }

        print_rewrite(commit, &new_message, colored);
        plan.rewrites.push(PlannedRewrite {
            hash: commit.hash.clone(),
            short_hash: commit.short_hash.clone(),
            old_message: commit.message.clone(),
            new_message,
        });
    }

    println!();
    ui::info(
        &format!(
            "{} to rewrite, {} kept, {} merge commit(s) skipped",
            plan.rewrites.len(),
            plan.kept,
            plan.skipped_merges
        ),
        colored,
    );
    Ok(plan)
}

/// Fewer than three words.
pub fn is_too_short(message: &str) -> bool {
    message.split_whitespace().count() < constants::git::MIN_MESSAGE_WORDS
}

/// `REWRITE` anywhere in the answer; everything else keeps the message.
pub fn wants_rewrite(answer: &str) -> bool {
    answer.to_uppercase().contains("REWRITE")
}

async fn classify(
    llm: &dyn LlmProvider,
    config: &ConfigStore,
    commit: &CommitInfo,
    files: &str,
    patch: &str,
    language: &str,
) -> Result<bool> {
    let mut call = LlmCall::new(
        COMMAND,
        rewrite_classification_prompt(&commit.message, files, patch),
        language,
    );
    call.max_completion_tokens = Some(constants::git::CLASSIFICATION_MAX_COMPLETION);

    match ask(llm, config, call).await {
        Ok(completion) => Ok(wants_rewrite(&completion.text)),
        Err(AbError::MissingCredential(var)) => Err(AbError::MissingCredential(var)),
        Err(e) => {
            // 分类失败时退回词数规则
            tracing::warn!("Classification failed for {}: {}", commit.short_hash, e);
            Ok(is_too_short(&commit.message))
        }
    }
}

fn warn_if_pushed(git: &dyn GitOperations, commits: &[CommitInfo], colored: bool) -> Result<()> {
    if !git.has_remotes()? {
        return Ok(());
    }
    // 祖先先被推送，只需要看最旧的一个
    let Some(oldest) = commits.first() else {
        return Ok(());
    };
    let remotes = git.remote_branches_containing(&oldest.hash)?;
    if !remotes.is_empty() {
        ui::warning(
            &format!(
                "Some commits are already pushed ({}). Rewriting them requires a force push.",
                remotes.join(", ")
            ),
            colored,
        );
    }
    Ok(())
}

fn print_rewrite(commit: &CommitInfo, new_message: &str, colored: bool) {
    println!();
    if colored {
        println!("{} {}", commit.short_hash.yellow(), commit.subject().red());
        println!("  -> {}", new_message.lines().next().unwrap_or("").green());
    } else {
        println!("{} {}", commit.short_hash, commit.subject());
        println!("  -> {}", new_message.lines().next().unwrap_or(""));
    }
}

fn short(hash: &str) -> &str {
    hash.get(..7).unwrap_or(hash)
}
