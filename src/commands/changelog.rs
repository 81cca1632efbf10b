use std::collections::BTreeMap;
use std::fs;

use super::format::pretty_json_or_raw;
use super::options::ChangelogOptions;
use super::{LlmCall, ask};
use crate::config::ConfigStore;
use crate::constants;
use crate::error::{AbError, Result};
use crate::git::repository::GitRepository;
use crate::git::{CommitInfo, GitOperations};
use crate::llm::LlmProvider;
use crate::llm::prompt::{ChangelogFormat, changelog_prompt};
use crate::llm::provider::create_provider;
use crate::llm::provider::utils::strip_code_fences;
use crate::ui;

const COMMAND: &str = "changelog";

/// Conventional-commit style category of a commit subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    Features,
    Fixes,
    Refactor,
    Docs,
    Chore,
    Test,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Features => "features",
            Category::Fixes => "fixes",
            Category::Refactor => "refactor",
            Category::Docs => "docs",
            Category::Chore => "chore",
            Category::Test => "test",
            Category::Other => "other",
        }
    }

    /// `feat: x` / `fix(scope): y`; anything else is [`Category::Other`].
    pub fn of(subject: &str) -> Self {
        const PREFIXES: &[(&str, Category)] = &[
            ("feat", Category::Features),
            ("feature", Category::Features),
            ("fix", Category::Fixes),
            ("bug", Category::Fixes),
            ("refactor", Category::Refactor),
            ("docs", Category::Docs),
            ("doc", Category::Docs),
            ("chore", Category::Chore),
            ("test", Category::Test),
            ("tests", Category::Test),
        ];

        let subject = subject.to_lowercase();
        PREFIXES
            .iter()
            .find(|(prefix, _)| {
                subject.starts_with(&format!("{}:", prefix))
                    || subject.starts_with(&format!("{}(", prefix))
            })
            .map_or(Category::Other, |(_, category)| *category)
    }
}

/// `ab git changelog`
pub async fn run(options: &ChangelogOptions, config: &ConfigStore, colored: bool) -> Result<()> {
    let repo = GitRepository::open()?;
    let provider = create_provider(config)?;
    run_internal(options, config, &repo, provider.as_ref(), colored).await
}

pub async fn run_internal(
    options: &ChangelogOptions,
    config: &ConfigStore,
    git: &dyn GitOperations,
    llm: &dyn LlmProvider,
    colored: bool,
) -> Result<()> {
    if git.is_empty()? {
        ui::warning("No commits found in specified range", colored);
        return Ok(());
    }

    let range = match options.range.as_deref() {
        Some(range) => range.to_string(),
        None => default_range(git, colored)?,
    };

    let commits = git.commits_in_range(&range)?;
    if commits.is_empty() {
        ui::warning("No commits found in specified range", colored);
        return Ok(());
    }
    ui::info(&format!("Found {} commits", commits.len()), colored);

    if options.categorize {
        print_category_summary(&commits);
    }

    ui::info("Generating changelog...", colored);
    let language = config.language(Some(COMMAND), options.language.as_deref());
    let prompt = changelog_prompt(
        &range,
        &commit_lines(&commits),
        options.categorize,
        options.format,
    );
    let completion = ask(
        llm,
        config,
        LlmCall::new(COMMAND, prompt, language).with_spinner("Waiting for the model..."),
    )
    .await?;

    let changelog = match options.format {
        ChangelogFormat::Json => pretty_json_or_raw(&completion.text),
        _ => strip_code_fences(&completion.text),
    };
    if changelog.is_empty() {
        return Err(AbError::Llm("Failed to generate changelog".to_string()));
    }

    println!();
    println!("{}", changelog);
    println!();

    if let Some(path) = &options.output {
        fs::write(path, format!("{}\n", changelog))?;
        ui::success(&format!("Changelog written to: {}", path.display()), colored);
    }
    Ok(())
}

/// `<latest tag>..HEAD`, else the last 50 commits (all of them in shorter histories).
fn default_range(git: &dyn GitOperations, colored: bool) -> Result<String> {
    if let Some(tag) = git.latest_tag()? {
        let range = format!("{}..HEAD", tag);
        ui::info(&format!("Using range: {}", range), colored);
        return Ok(range);
    }

    ui::warning(
        &format!(
            "No tags found, using last {} commits",
            constants::git::CHANGELOG_FALLBACK_DEPTH
        ),
        colored,
    );
    Ok(clamped_range(
        git.commit_count()?,
        constants::git::CHANGELOG_FALLBACK_DEPTH,
    ))
}

/// `HEAD~depth..HEAD`, or `--root` when the history is not deeper than `depth`.
pub fn clamped_range(total: usize, depth: usize) -> String {
    if total <= depth {
        "--root".to_string()
    } else {
        format!("HEAD~{}..HEAD", depth)
    }
}

/// `git log --oneline` layout, newest first.
fn commit_lines(commits: &[CommitInfo]) -> String {
    commits
        .iter()
        .rev()
        .map(|c| format!("{} {}", c.short_hash, c.subject()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn categorize(commits: &[CommitInfo]) -> BTreeMap<Category, Vec<&CommitInfo>> {
    let mut groups: BTreeMap<Category, Vec<&CommitInfo>> = BTreeMap::new();
    for commit in commits {
        groups.entry(Category::of(commit.subject())).or_default().push(commit);
    }
    groups
}

fn print_category_summary(commits: &[CommitInfo]) {
    let summary: Vec<String> = categorize(commits)
        .iter()
        .map(|(category, items)| format!("{}: {}", category.as_str(), items.len()))
        .collect();
    println!("Categories: {}", summary.join(", "));
}
