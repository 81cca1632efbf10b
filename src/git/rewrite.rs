//! Commit message rewriting
//!
//! Rebuilds the chain reachable from HEAD with `git commit-tree`, keeping
//! every tree and identity, then moves the current branch with
//! `git update-ref`. Commits whose message and parents are unchanged keep
//! their object id.

use std::collections::HashMap;

use chrono::Local;
use git2::{Oid, Signature, Sort, Time};

use crate::constants;
use crate::error::{AbError, Result};
use crate::git::command::{run_git, run_git_with_env};
use crate::git::repository::GitRepository;
use crate::git::GitOperations;

/// Outcome of a rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteResult {
    pub old_head: String,
    pub new_head: String,
    /// Commits that received a new object id (message or parent change).
    pub rebuilt: usize,
}

/// `backup/pre-rewrite-<YYYYmmdd-HHMMSS>` unless a custom name is given.
pub fn backup_branch_name(custom: Option<&str>) -> String {
    match custom.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => name.to_string(),
        None => format!(
            "{}{}",
            constants::git::BACKUP_BRANCH_PREFIX,
            Local::now().format("%Y%m%d-%H%M%S")
        ),
    }
}

/// Create a branch at HEAD without switching to it.
pub fn create_backup(repo: &GitRepository, name: &str) -> Result<()> {
    if repo.branch_exists(name)? {
        return Err(AbError::InvalidInput(format!(
            "Backup branch '{}' already exists",
            name
        )));
    }
    repo.create_branch(name, false)
}

/// git 能识别的内部日期格式：`@<秒> <+hhmm>`
pub fn format_git_date(time: Time) -> String {
    let offset = time.offset_minutes();
    let sign = if offset < 0 { '-' } else { '+' };
    let offset = offset.abs();
    format!(
        "@{} {}{:02}{:02}",
        time.seconds(),
        sign,
        offset / 60,
        offset % 60
    )
}

fn identity_env(prefix: &str, sig: &Signature) -> Vec<(&'static str, String)> {
    let name = String::from_utf8_lossy(sig.name_bytes()).to_string();
    let email = String::from_utf8_lossy(sig.email_bytes()).to_string();
    let date = format_git_date(sig.when());
    match prefix {
        "AUTHOR" => vec![
            ("GIT_AUTHOR_NAME", name),
            ("GIT_AUTHOR_EMAIL", email),
            ("GIT_AUTHOR_DATE", date),
        ],
        _ => vec![
            ("GIT_COMMITTER_NAME", name),
            ("GIT_COMMITTER_EMAIL", email),
            ("GIT_COMMITTER_DATE", date),
        ],
    }
}

/// Replace commit messages, keyed by full commit hash.
///
/// Returns `None` when there is nothing to replace.
pub fn rewrite_messages(
    repo: &GitRepository,
    replacements: &HashMap<String, String>,
) -> Result<Option<RewriteResult>> {
    if replacements.is_empty() {
        return Ok(None);
    }

    let git = repo.inner();
    let head = git.head()?;
    if !head.is_branch() {
        return Err(AbError::InvalidInput(
            "Cannot rewrite history on a detached HEAD".to_string(),
        ));
    }
    let branch_ref = head
        .name()
        .ok_or_else(|| AbError::GitCommand("HEAD reference name is not valid UTF-8".into()))?
        .to_string();
    let old_head = head.peel_to_commit()?.id();

    let mut revwalk = git.revwalk()?;
    revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
    revwalk.push(old_head)?;

    let root = repo.root();
    let mut mapping: HashMap<Oid, Oid> = HashMap::new();
    let mut rebuilt = 0;

    for oid in revwalk {
        let oid = oid?;
        let commit = git.find_commit(oid)?;
        let parents: Vec<Oid> = commit
            .parent_ids()
            .map(|p| mapping.get(&p).copied().unwrap_or(p))
            .collect();
        let parents_changed = parents.iter().zip(commit.parent_ids()).any(|(a, b)| *a != b);
        let new_message = replacements.get(&oid.to_string());

        if new_message.is_none() && !parents_changed {
            mapping.insert(oid, oid);
            continue;
        }

        let message = match new_message {
            Some(m) => m.clone(),
            None => String::from_utf8_lossy(commit.message_bytes()).to_string(),
        };

        let tree = commit.tree_id().to_string();
        let parent_strings: Vec<String> = parents.iter().map(Oid::to_string).collect();
        let mut args: Vec<&str> = vec!["commit-tree", &tree];
        for parent in &parent_strings {
            args.push("-p");
            args.push(parent);
        }
        args.push("-m");
        args.push(&message);

        let mut envs = identity_env("AUTHOR", &commit.author());
        envs.extend(identity_env("COMMITTER", &commit.committer()));

        let new_id = run_git_with_env(&root, &args, &envs)?;
        let new_oid = Oid::from_str(new_id.trim())?;
        tracing::debug!("Rewrote {} -> {}", oid, new_oid);
        mapping.insert(oid, new_oid);
        rebuilt += 1;
    }

    let new_head = mapping.get(&old_head).copied().unwrap_or(old_head);
    if new_head != old_head {
        run_git(
            &root,
            &[
                "update-ref",
                "-m",
                "ab: rewrite commit messages",
                &branch_ref,
                &new_head.to_string(),
                &old_head.to_string(),
            ],
        )?;
    }

    Ok(Some(RewriteResult {
        old_head: old_head.to_string(),
        new_head: new_head.to_string(),
        rebuilt,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_git_date() {
        assert_eq!(format_git_date(Time::new(1700000000, 120)), "@1700000000 +0200");
        assert_eq!(format_git_date(Time::new(1700000000, -330)), "@1700000000 -0530");
        assert_eq!(format_git_date(Time::new(0, 0)), "@0 +0000");
    }

    #[test]
    fn test_backup_branch_name() {
        assert_eq!(backup_branch_name(Some("my-backup")), "my-backup");
        let generated = backup_branch_name(None);
        assert!(generated.starts_with("backup/pre-rewrite-"));
        // YYYYmmdd-HHMMSS
        assert_eq!(generated.len(), "backup/pre-rewrite-".len() + 15);
        assert!(backup_branch_name(Some("  ")).starts_with("backup/pre-rewrite-"));
    }
}
