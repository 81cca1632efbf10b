use std::path::Path;
use std::process::Command;
use std::sync::LazyLock;

use colored::Colorize;
use regex::Regex;

use super::options::PrDescriptionOptions;
use super::{LlmCall, ask};
use crate::config::ConfigStore;
use crate::constants;
use crate::error::{AbError, Result};
use crate::git::GitOperations;
use crate::git::repository::GitRepository;
use crate::llm::LlmProvider;
use crate::llm::prompt::{PrInput, pr_description_prompt};
use crate::llm::provider::create_provider;
use crate::ui;

const COMMAND: &str = "pr-description";

static TITLE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^TITLE:\s*(.+)$").expect("valid regex"));
static DESCRIPTION_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?ms)^DESCRIPTION:\s*\n(.+)").expect("valid regex"));

/// Title and body parsed from the model answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrContent {
    pub title: String,
    pub body: String,
}

/// `ab git pr-description`
pub async fn run(
    options: &PrDescriptionOptions,
    config: &ConfigStore,
    colored: bool,
) -> Result<()> {
    if options.create {
        ensure_gh_ready()?;
    }
    let repo = GitRepository::open()?;
    let provider = create_provider(config)?;
    let Some(content) = run_internal(options, config, &repo, provider.as_ref(), colored).await?
    else {
        return Ok(());
    };

    if !options.create {
        ui::info("Use -c to create the PR automatically", colored);
        return Ok(());
    }
    if !options.yes && !ui::confirm("Create PR with this content?", true)? {
        ui::warning("PR creation cancelled", colored);
        return Ok(());
    }

    let base = options
        .base
        .clone()
        .unwrap_or_else(|| detect_base_branch(&repo));
    ui::info("Creating PR...", colored);
    let url = create_pr(&repo.root(), &content, &base, options.draft)?;
    println!();
    ui::success("PR created successfully!", colored);
    ui::info(&format!("URL: {}", url), colored);
    Ok(())
}

/// Generate and print the PR content. `None` when there is nothing to describe.
pub async fn run_internal(
    options: &PrDescriptionOptions,
    config: &ConfigStore,
    git: &dyn GitOperations,
    llm: &dyn LlmProvider,
    colored: bool,
) -> Result<Option<PrContent>> {
    let base = options
        .base
        .clone()
        .unwrap_or_else(|| detect_base_branch(git));
    let current = git.current_branch()?.ok_or_else(|| {
        AbError::GitCommand("HEAD is detached; check out a branch first".to_string())
    })?;

    ui::info(&format!("Current branch: {}", current), colored);
    ui::info(&format!("Base branch: {}", base), colored);

    if current == base {
        return Err(AbError::InvalidInput(format!(
            "You are on the base branch ({}). Create a feature branch first.",
            base
        )));
    }

    let base_ref = resolve_base_ref(git, &base)?;
    let ahead = git.commits_ahead(&base_ref)?;
    if ahead == 0 {
        ui::warning(&format!("No commits ahead of {}", base), colored);
        return Ok(None);
    }
    ui::info(&format!("Commits ahead: {}", ahead), colored);
    println!();

    ui::info("Analyzing changes...", colored);
    let commits = git.log_since(&base_ref)?;
    let diff = git.diff_against(&base_ref)?;
    let files = git.files_changed_against(&base_ref)?;
    if diff.trim().is_empty() {
        ui::warning(&format!("No changes detected compared to {}", base), colored);
        return Ok(None);
    }

    ui::info("Generating PR title and description...", colored);
    let language = config.language(Some(COMMAND), options.language.as_deref());
    let prompt = pr_description_prompt(&PrInput {
        branch: &current,
        base: &base,
        commits: &commits,
        files_changed: &files,
        diff: &diff,
    });
    let completion = ask(
        llm,
        config,
        LlmCall::new(COMMAND, prompt, language).with_spinner("Waiting for the model..."),
    )
    .await?;

    let content = parse_pr_content(&completion.text).ok_or_else(|| {
        AbError::Llm("Failed to generate PR description: empty response".to_string())
    })?;

    print_block("PR Title:", &content.title, colored);
    print_block("PR Description:", &content.body, colored);
    Ok(Some(content))
}

/// First of main, master, develop that exists locally or on origin; `main` otherwise.
pub fn detect_base_branch(git: &dyn GitOperations) -> String {
    for candidate in constants::git::BASE_BRANCH_CANDIDATES {
        let local = git.branch_exists(candidate).unwrap_or(false);
        let remote = git
            .branch_exists(&format!("origin/{}", candidate))
            .unwrap_or(false);
        if local || remote {
            return candidate.to_string();
        }
    }
    "main".to_string()
}

/// The base as a ref git can resolve: the local branch, else `origin/<base>`.
fn resolve_base_ref(git: &dyn GitOperations, base: &str) -> Result<String> {
    if git.branch_exists(base)? {
        return Ok(base.to_string());
    }
    let remote = format!("origin/{}", base);
    if git.branch_exists(&remote)? {
        return Ok(remote);
    }
    Err(AbError::InvalidInput(format!(
        "Base branch '{}' not found. Use -b to specify it.",
        base
    )))
}

/// `TITLE:` line and `DESCRIPTION:` block; without them the first line is
/// the title and the rest the body.
pub fn parse_pr_content(response: &str) -> Option<PrContent> {
    let response = response.trim();
    if response.is_empty() {
        return None;
    }

    let title = match TITLE_LINE.captures(response).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim().to_string(),
        None => response.lines().next().unwrap_or("").trim().to_string(),
    };

    let body = match DESCRIPTION_BLOCK.captures(response).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim().to_string(),
        None => {
            let rest: Vec<&str> = response.lines().skip(1).collect();
            if rest.is_empty() {
                response.to_string()
            } else {
                rest.join("\n").trim().to_string()
            }
        }
    };

    Some(PrContent { title, body })
}

fn print_block(label: &str, text: &str, colored: bool) {
    if colored {
        println!("{}", label.green());
    } else {
        println!("{}", label);
    }
    println!("{}", "-".repeat(40));
    println!("{}", text);
    println!("{}", "-".repeat(40));
    println!();
}

/// `gh` must be installed and logged in before anything is generated.
fn ensure_gh_ready() -> Result<()> {
    if which::which("gh").is_err() {
        return Err(AbError::Other(
            "gh CLI is not installed. Install it from https://cli.github.com".to_string(),
        ));
    }
    let status = Command::new("gh").args(["auth", "status"]).output()?;
    if !status.status.success() {
        return Err(AbError::Other(
            "gh is not authenticated. Run: gh auth login".to_string(),
        ));
    }
    Ok(())
}

fn create_pr(root: &Path, content: &PrContent, base: &str, draft: bool) -> Result<String> {
    let mut args = vec![
        "pr",
        "create",
        "--title",
        content.title.as_str(),
        "--body",
        content.body.as_str(),
        "--base",
        base,
    ];
    if draft {
        args.push("--draft");
    }
    let output = Command::new("gh").args(&args).current_dir(root).output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = if stderr.trim().is_empty() {
            String::from_utf8_lossy(&output.stdout).to_string()
        } else {
            stderr.to_string()
        };
        return Err(AbError::Other(format!(
            "Failed to create PR: {}",
            detail.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
