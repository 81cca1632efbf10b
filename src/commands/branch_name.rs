use std::sync::LazyLock;

use regex::Regex;

use super::options::BranchNameOptions;
use super::{LlmCall, ask};
use crate::config::ConfigStore;
use crate::constants;
use crate::error::{AbError, Result};
use crate::git::GitOperations;
use crate::git::repository::GitRepository;
use crate::llm::LlmProvider;
use crate::llm::prompt::{BranchNameInput, branch_name_prompt};
use crate::llm::provider::create_provider;
use crate::ui;

const COMMAND: &str = "branch-name";

static JIRA_TICKET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z]+-\d+)").expect("valid regex"));
static ISSUE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\d+)").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// `ab git branch-name`
pub async fn run(options: &BranchNameOptions, config: &ConfigStore, colored: bool) -> Result<()> {
    let repo = GitRepository::open()?;
    let provider = create_provider(config)?;
    run_internal(options, config, &repo, provider.as_ref(), colored).await
}

pub async fn run_internal(
    options: &BranchNameOptions,
    config: &ConfigStore,
    git: &dyn GitOperations,
    llm: &dyn LlmProvider,
    colored: bool,
) -> Result<()> {
    let description = options.description.trim();
    if description.is_empty() {
        return Err(AbError::InvalidInput(
            "A description of the branch is required".to_string(),
        ));
    }

    let language = config.language(Some(COMMAND), options.language.as_deref());
    let ticket = extract_ticket(description);
    if let Some(ticket) = &ticket {
        tracing::debug!("Ticket found in description: {}", ticket);
    }

    ui::info("Generating branch name...", colored);
    let name = suggest_branch_name(
        llm,
        config,
        COMMAND,
        &BranchNameInput {
            description,
            ticket: ticket.as_deref(),
            forced_prefix: options.prefix.as_deref(),
            diff_preview: None,
        },
        &language,
    )
    .await?;

    if name.is_empty() {
        return Err(AbError::Llm("The model returned an empty branch name".to_string()));
    }

    println!();
    println!("Suggested branch name:");
    println!("  {}", name);
    println!();

    if !options.create {
        return Ok(());
    }

    if git.branch_exists(&name)? {
        return Err(AbError::InvalidInput(format!(
            "Branch '{}' already exists",
            name
        )));
    }
    if !options.yes && !ui::confirm(&format!("Create and checkout '{}'?", name), true)? {
        ui::warning("Cancelled", colored);
        return Ok(());
    }

    git.create_branch(&name, true)?;
    ui::success(&format!("Created and switched to '{}'", name), colored);
    Ok(())
}

/// Ask the model for a branch name and sanitise the answer.
///
/// Returns an empty string when nothing usable came back.
pub async fn suggest_branch_name(
    llm: &dyn LlmProvider,
    config: &ConfigStore,
    command: &str,
    input: &BranchNameInput<'_>,
    language: &str,
) -> Result<String> {
    let mut call = LlmCall::new(command, branch_name_prompt(input), language)
        .with_spinner("Asking the model for a branch name...");
    call.max_completion_tokens = Some(constants::llm::BRANCH_NAME_MAX_COMPLETION);
    let completion = ask(llm, config, call).await?;
    Ok(sanitize_branch_name(&completion.text))
}

/// `ABC-123` first, then GitHub-style `#123` (returned without the `#`).
pub fn extract_ticket(description: &str) -> Option<String> {
    JIRA_TICKET
        .captures(description)
        .or_else(|| ISSUE_NUMBER.captures(description))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// First line of the answer, whitespace turned into `-`, anything outside
/// `[A-Za-z0-9/_-]` dropped, cut at 50 characters.
pub fn sanitize_branch_name(raw: &str) -> String {
    let unquoted = raw.trim().trim_matches(|c| matches!(c, '"' | '\'' | '`'));
    let first_line = unquoted.lines().next().unwrap_or("").trim();
    let dashed = WHITESPACE.replace_all(first_line, "-");

    let cleaned: String = dashed
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '-'))
        .collect();

    if cleaned.len() > constants::git::MAX_BRANCH_NAME_LEN {
        cleaned[..constants::git::MAX_BRANCH_NAME_LEN]
            .trim_end_matches('-')
            .to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockGitOperations;
    use crate::llm::provider::test_utils::test_config;
    use crate::llm::{Completion, MockLlmProvider};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_ticket() {
        assert_eq!(
            extract_ticket("JIRA-123: fix button alignment").as_deref(),
            Some("JIRA-123")
        );
        assert_eq!(extract_ticket("#456 refactor auth").as_deref(), Some("456"));
        assert_eq!(extract_ticket("update readme"), None);
    }

    #[test]
    fn test_sanitize_branch_name() {
        assert_eq!(
            sanitize_branch_name("`feature/add user login`\nexplanation"),
            "feature/add-user-login"
        );
        assert_eq!(sanitize_branch_name("fix/bug!@#(1)"), "fix/bug1");
        assert_eq!(sanitize_branch_name(""), "");

        let long = format!("feature/{}", "a-".repeat(40));
        let cut = sanitize_branch_name(&long);
        assert!(cut.len() <= 50);
        assert!(!cut.ends_with('-'));
    }

    #[tokio::test]
    async fn test_create_branch_with_yes() {
        let config = test_config("http://127.0.0.1:9", "AB_UNUSED_KEY");
        let mut llm = MockLlmProvider::new();
        llm.expect_complete()
            .withf(|req| req.prompt.contains("JIRA-7") && req.max_tokens == Some(100))
            .returning(|_| {
                Ok(Completion {
                    text: "fix/JIRA-7-login-timeout".into(),
                    ..Default::default()
                })
            });

        let mut git = MockGitOperations::new();
        git.expect_branch_exists().returning(|_| Ok(false));
        git.expect_create_branch()
            .withf(|name, checkout| name == "fix/JIRA-7-login-timeout" && *checkout)
            .times(1)
            .returning(|_, _| Ok(()));

        let options = BranchNameOptions {
            description: "JIRA-7 login times out".into(),
            create: true,
            yes: true,
            ..Default::default()
        };
        run_internal(&options, &config, &git, &llm, false).await.unwrap();
    }

    #[tokio::test]
    async fn test_existing_branch_is_refused() {
        let config = test_config("http://127.0.0.1:9", "AB_UNUSED_KEY");
        let mut llm = MockLlmProvider::new();
        llm.expect_complete().returning(|_| {
            Ok(Completion {
                text: "docs/update-readme".into(),
                ..Default::default()
            })
        });
        let mut git = MockGitOperations::new();
        git.expect_branch_exists().returning(|_| Ok(true));
        git.expect_create_branch().never();

        let options = BranchNameOptions {
            description: "update readme".into(),
            create: true,
            yes: true,
            ..Default::default()
        };
        let err = run_internal(&options, &config, &git, &llm, false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
