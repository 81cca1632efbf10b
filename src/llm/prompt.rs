//! Prompt templates
//!
//! Each builder returns the user prompt only; the output-language
//! instruction and file context are appended by
//! [`CompletionRequest::full_prompt`](crate::llm::CompletionRequest::full_prompt).

use std::fmt;

/// Commit message generation rules
const COMMIT_RULES: &str = r#"Rules:
- Output ONLY the commit message, with no explanation around it
- Keep it concise and specific to the change
- First line: at most 100 characters, imperative summary
- If more detail helps, add a blank line and then bullet points
- Do not add footers, trailers or sign-offs"#;

pub fn commit_message_prompt(recent_commits: &str, files_changed: &str, diff: &str) -> String {
    format!(
        "Write a git commit message for the staged changes below.\n\n{}\n\n\
         RECENT COMMITS (style reference):\n{}\n\n\
         FILES CHANGED:\n{}\n\n\
         DIFF:\n{}",
        COMMIT_RULES,
        or_none(recent_commits),
        or_none(files_changed),
        diff
    )
}

/// Input for [`branch_name_prompt`].
#[derive(Debug, Clone, Default)]
pub struct BranchNameInput<'a> {
    pub description: &'a str,
    pub ticket: Option<&'a str>,
    pub forced_prefix: Option<&'a str>,
    pub diff_preview: Option<&'a str>,
}

pub fn branch_name_prompt(input: &BranchNameInput<'_>) -> String {
    let mut prompt = String::from(
        "Suggest one git branch name for the work described below.\n\n\
         Rules:\n\
         - Output ONLY the branch name\n\
         - kebab-case, lowercase, at most 50 characters\n\
         - Start with one of: feature/, fix/, chore/, refactor/, docs/, test/\n",
    );
    if let Some(ticket) = input.ticket {
        prompt.push_str(&format!(
            "- Include the ticket id '{}' right after the prefix\n",
            ticket
        ));
    }
    if let Some(prefix) = input.forced_prefix {
        prompt.push_str(&format!("- The prefix MUST be '{}/'\n", prefix.trim_end_matches('/')));
    }
    prompt.push_str(&format!("\nDESCRIPTION:\n{}\n", input.description));
    if let Some(diff) = input.diff_preview.filter(|d| !d.trim().is_empty()) {
        prompt.push_str(&format!("\nCURRENT CHANGES (preview):\n{}\n", diff));
    }
    prompt
}

/// Input for [`pr_description_prompt`].
#[derive(Debug, Clone)]
pub struct PrInput<'a> {
    pub branch: &'a str,
    pub base: &'a str,
    pub commits: &'a str,
    pub files_changed: &'a str,
    pub diff: &'a str,
}

pub fn pr_description_prompt(input: &PrInput<'_>) -> String {
    format!(
        r#"Read the commits and changes below and write a title and description for a Pull Request.

Rules:
1. Follow the response format below exactly
2. Title: at most 72 characters
3. Summary: 2-4 bullet points
4. Changes: only the most relevant files
5. Testing: 2-4 suggested checks

BRANCH: {branch}
BASE: {base}

COMMITS:
{commits}

FILES CHANGED:
{files}

DIFF:
{diff}

RESPONSE FORMAT:
TITLE: <title>

DESCRIPTION:
## Summary
- ...

## Changes
- file: what changed

## Testing
- [ ] ...
"#,
        branch = input.branch,
        base = input.base,
        commits = or_none(input.commits),
        files = or_none(input.files_changed),
        diff = input.diff
    )
}

/// Changelog output format, shared by the prompt and the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangelogFormat {
    #[default]
    Markdown,
    Plain,
    Json,
}

impl ChangelogFormat {
    fn instruction(&self) -> &'static str {
        match self {
            ChangelogFormat::Markdown => {
                "Markdown with a header per section (## Features, ## Bug Fixes, ...) and bullet points."
            }
            ChangelogFormat::Plain => "Plain text with clearly separated sections.",
            ChangelogFormat::Json => {
                "A single valid JSON object whose keys are categories and whose values are arrays of changes."
            }
        }
    }
}

impl fmt::Display for ChangelogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangelogFormat::Markdown => "markdown",
            ChangelogFormat::Plain => "plain",
            ChangelogFormat::Json => "json",
        };
        f.write_str(s)
    }
}

pub fn changelog_prompt(
    range: &str,
    commits: &str,
    categorize: bool,
    format: ChangelogFormat,
) -> String {
    let categories = if categorize {
        "\nGroup the entries by type:\n\
         - Features: new functionality\n\
         - Bug Fixes: fixes\n\
         - Refactoring: internal improvements with no behaviour change\n\
         - Documentation: docs only\n\
         - Other: everything else\n"
    } else {
        ""
    };

    format!(
        "Write release notes for the git commits below.\n\n\
         COMMIT RANGE: {}\n\n\
         COMMITS:\n{}\n{}\n\
         FORMAT: {}\n\n\
         Rules:\n\
         1. Merge related commits into a single entry when possible\n\
         2. Describe changes for users, not in raw git wording\n\
         3. Call out breaking changes\n\
         4. Be brief but informative\n",
        range,
        commits,
        categories,
        format.instruction()
    )
}

/// One side-by-side conflict for [`conflict_prompt`].
#[derive(Debug, Clone)]
pub struct ConflictInput<'a> {
    pub file: &'a str,
    pub start_line: usize,
    pub end_line: usize,
    pub before: &'a str,
    pub ours_label: &'a str,
    pub ours: &'a str,
    pub theirs_label: &'a str,
    pub theirs: &'a str,
    pub after: &'a str,
}

pub fn conflict_prompt(input: &ConflictInput<'_>) -> String {
    format!(
        r#"You are a code merging assistant. Produce the merged code for this conflict.

FILE: {file}
CONFLICT LOCATION: lines {start}-{end}

CONTEXT BEFORE CONFLICT:
{before}

=== OUR VERSION ({ours_label}) ===
{ours}

=== THEIR VERSION ({theirs_label}) ===
{theirs}

CONTEXT AFTER CONFLICT:
{after}

Instructions:
1. Work out what each side is trying to do
2. Keep both changes when they are compatible
3. When they really clash, pick the better implementation
4. Output ONLY the resolved code: no conflict markers, no explanation
5. The result must be valid code in context

RESOLVED CODE:"#,
        file = input.file,
        start = input.start_line,
        end = input.end_line,
        before = input.before,
        ours_label = input.ours_label,
        ours = input.ours,
        theirs_label = input.theirs_label,
        theirs = input.theirs,
        after = input.after
    )
}

/// Ask whether a commit message should be rewritten. Expected answer:
/// `KEEP` or `REWRITE`.
pub fn rewrite_classification_prompt(message: &str, files: &str, diff: &str) -> String {
    format!(
        "Decide whether this git commit message describes its change well.\n\n\
         Answer with exactly one word: KEEP if the message is clear and accurate, \
         REWRITE if it is vague, misleading, or too short.\n\n\
         MESSAGE:\n{}\n\n\
         FILES:\n{}\n\n\
         DIFF:\n{}",
        message,
        or_none(files),
        diff
    )
}

pub fn rewrite_message_prompt(old_message: &str, files: &str, diff: &str) -> String {
    format!(
        "Write a better git commit message for the commit below.\n\n{}\n\n\
         CURRENT MESSAGE:\n{}\n\n\
         FILES CHANGED:\n{}\n\n\
         DIFF:\n{}",
        COMMIT_RULES,
        old_message,
        or_none(files),
        diff
    )
}

/// Input for [`explain_prompt`].
#[derive(Debug, Clone)]
pub struct ExplainInput<'a> {
    pub main_content: &'a str,
    pub context: &'a str,
    pub question: &'a str,
    pub detailed: bool,
}

pub fn explain_prompt(input: &ExplainInput<'_>) -> String {
    let detail = if input.detailed {
        "detailed and comprehensive"
    } else {
        "concise but clear"
    };
    format!(
        "You are a helpful technical assistant. Give a {} explanation.\n\n{}\n\n{}\n\nQUESTION: {}\n",
        detail, input.main_content, input.context, input.question
    )
}

/// gen-script output shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptMode {
    Full,
    Cron,
    #[default]
    Oneshot,
}

/// Input for [`gen_script_prompt`].
#[derive(Debug, Clone)]
pub struct ScriptInput<'a> {
    pub description: &'a str,
    pub language: &'a str,
    pub system_context: &'a str,
    pub directory_listing: &'a str,
    pub mode: ScriptMode,
}

pub fn gen_script_prompt(input: &ScriptInput<'_>) -> String {
    let lang = input.language;
    match input.mode {
        ScriptMode::Full => format!(
            r#"Write a complete, production-ready {lang} script.

TASK DESCRIPTION:
{task}

SYSTEM ENVIRONMENT:
{system}

CURRENT DIRECTORY LISTING:
{listing}

Requirements:
1. Output ONLY the script, nothing before or after it
2. Start with a suitable shebang line
3. Follow {lang} conventions (bash: set -euo pipefail, quoted variables, a usage function; python: a main guard, exception handling, argparse when needed)
4. Validate inputs and handle errors
5. Comment the non-obvious parts
6. Check that files exist before operating on them
7. Only use commands available in the environment above

Script:"#,
            lang = lang,
            task = input.description,
            system = input.system_context,
            listing = input.directory_listing
        ),
        ScriptMode::Cron => format!(
            r#"Write a {lang} script meant to run from cron.

TASK DESCRIPTION:
{task}

SYSTEM ENVIRONMENT:
{system}

CURRENT DIRECTORY LISTING:
{listing}

Requirements:
1. Output ONLY the script, nothing before or after it
2. Include a shebang line
3. Never wait for interactive input
4. Log to a file or syslog
5. Fail gracefully
6. Use absolute paths
7. Only use commands available in the environment above

Cron script:"#,
            lang = lang,
            task = input.description,
            system = input.system_context,
            listing = input.directory_listing
        ),
        ScriptMode::Oneshot => format!(
            r#"Give the SHORTEST {lang} command that does this task.

TASK DESCRIPTION:
{task}

SYSTEM ENVIRONMENT:
{system}

Rules:
1. Output ONLY the command
2. Prefer a one-liner
3. No shebang, no comments
4. No validation, error handling or usage text
5. Ready to paste into a terminal
6. If one line is impossible, chain the minimum with ; or &&
7. Use environment variables directly
8. Only use commands available in the environment above

Command:"#,
            lang = lang,
            task = input.description,
            system = input.system_context
        ),
    }
}

fn or_none(text: &str) -> &str {
    if text.trim().is_empty() { "(none)" } else { text }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_prompt_sections() {
        let prompt = commit_message_prompt("abc123 Add x", "M\tsrc/lib.rs", "+fn x() {}");
        assert!(prompt.contains("RECENT COMMITS"));
        assert!(prompt.contains("FILES CHANGED:\nM\tsrc/lib.rs"));
        assert!(prompt.ends_with("DIFF:\n+fn x() {}"));
        assert!(prompt.contains("100 characters"));
    }

    #[test]
    fn test_commit_prompt_empty_history() {
        let prompt = commit_message_prompt("", "", "diff");
        assert!(prompt.contains("RECENT COMMITS (style reference):\n(none)"));
    }

    #[test]
    fn test_branch_prompt_ticket_and_prefix() {
        let prompt = branch_name_prompt(&BranchNameInput {
            description: "fix login for ABC-42",
            ticket: Some("ABC-42"),
            forced_prefix: Some("fix/"),
            diff_preview: None,
        });
        assert!(prompt.contains("'ABC-42'"));
        assert!(prompt.contains("MUST be 'fix/'"));
        assert!(!prompt.contains("CURRENT CHANGES"));
    }

    #[test]
    fn test_pr_prompt_format_markers() {
        let prompt = pr_description_prompt(&PrInput {
            branch: "feature/x",
            base: "main",
            commits: "a1 add x",
            files_changed: "A\tx.rs",
            diff: "+x",
        });
        assert!(prompt.contains("BRANCH: feature/x"));
        assert!(prompt.contains("BASE: main"));
        assert!(prompt.contains("TITLE: <title>"));
        assert!(prompt.contains("DESCRIPTION:\n## Summary"));
    }

    #[test]
    fn test_changelog_prompt_categories_optional() {
        let with = changelog_prompt("v1..HEAD", "feat: a", true, ChangelogFormat::Json);
        assert!(with.contains("Bug Fixes"));
        assert!(with.contains("valid JSON object"));
        let without = changelog_prompt("v1..HEAD", "feat: a", false, ChangelogFormat::Plain);
        assert!(!without.contains("Group the entries"));
    }

    #[test]
    fn test_conflict_prompt_labels() {
        let prompt = conflict_prompt(&ConflictInput {
            file: "a.txt",
            start_line: 3,
            end_line: 9,
            before: "b",
            ours_label: "HEAD",
            ours: "one",
            theirs_label: "feature",
            theirs: "two",
            after: "a",
        });
        assert!(prompt.contains("lines 3-9"));
        assert!(prompt.contains("=== OUR VERSION (HEAD) ===\none"));
        assert!(prompt.contains("=== THEIR VERSION (feature) ===\ntwo"));
    }

    #[test]
    fn test_gen_script_modes_differ() {
        let base = ScriptInput {
            description: "count lines",
            language: "bash",
            system_context: "OS: Linux",
            directory_listing: "a.txt",
            mode: ScriptMode::Oneshot,
        };
        let oneshot = gen_script_prompt(&base);
        assert!(oneshot.contains("SHORTEST bash command"));
        assert!(!oneshot.contains("DIRECTORY LISTING"));

        let cron = gen_script_prompt(&ScriptInput {
            mode: ScriptMode::Cron,
            ..base.clone()
        });
        assert!(cron.contains("run from cron"));

        let full = gen_script_prompt(&ScriptInput {
            mode: ScriptMode::Full,
            ..base
        });
        assert!(full.contains("CURRENT DIRECTORY LISTING:\na.txt"));
    }

    #[test]
    fn test_explain_detail_level() {
        let input = ExplainInput {
            main_content: "=== CONCEPT ===\nmonads",
            context: "",
            question: "Explain the concept: monads",
            detailed: true,
        };
        assert!(explain_prompt(&input).contains("detailed and comprehensive"));
    }
}
