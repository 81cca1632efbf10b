//! Commit message 重写的端到端测试（真实 git 仓库）

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::process::Command;

use ab_cli::error::{AbError, Result};
use ab_cli::git::GitOperations;
use ab_cli::git::repository::GitRepository;
use ab_cli::git::rewrite::{create_backup, rewrite_messages};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git is installed");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// 三个 commit：wip / fix / 一个正常的
fn repo_with_history() -> Result<(TempDir, GitRepository)> {
    let dir = TempDir::new()?;
    git(dir.path(), &["init", "-q", "-b", "main"]);
    git(dir.path(), &["config", "user.name", "Original Author"]);
    git(dir.path(), &["config", "user.email", "author@example.com"]);
    git(dir.path(), &["config", "commit.gpgsign", "false"]);

    for (content, message) in [
        ("1\n", "wip"),
        ("2\n", "fix"),
        ("3\n", "docs: describe the configuration file"),
    ] {
        fs::write(dir.path().join("file.txt"), content)?;
        git(dir.path(), &["add", "-A"]);
        git(dir.path(), &["commit", "-q", "-m", message]);
    }

    let repo = GitRepository::discover(dir.path())?;
    Ok((dir, repo))
}

#[test]
fn test_rewrite_keeps_trees_and_authors() -> Result<()> {
    let (dir, repo) = repo_with_history()?;
    let before = repo.commits_in_range("--root")?;
    let old_tree = git(dir.path(), &["rev-parse", "HEAD^{tree}"]);

    let mut replacements = HashMap::new();
    replacements.insert(before[0].hash.clone(), "chore: initial scaffolding".to_string());
    replacements.insert(before[1].hash.clone(), "fix: correct the counter".to_string());

    let result = rewrite_messages(&repo, &replacements)?.expect("something to rewrite");
    assert_eq!(result.old_head, before[2].hash);
    assert_ne!(result.new_head, result.old_head);
    // 第三个 commit 的 message 没变，但父节点变了，也要重建
    assert_eq!(result.rebuilt, 3);

    let after = repo.commits_in_range("--root")?;
    let subjects: Vec<&str> = after.iter().map(|c| c.subject()).collect();
    assert_eq!(
        subjects,
        vec![
            "chore: initial scaffolding",
            "fix: correct the counter",
            "docs: describe the configuration file",
        ]
    );
    assert_eq!(after[2].hash, result.new_head);
    assert_eq!(git(dir.path(), &["rev-parse", "HEAD^{tree}"]), old_tree);

    for (old, new) in before.iter().zip(&after) {
        assert_eq!(new.author_name, "Original Author");
        assert_eq!(new.author_email, old.author_email);
        assert_eq!(new.timestamp, old.timestamp);
    }
    assert_eq!(repo.current_branch()?, Some("main".to_string()));
    Ok(())
}

#[test]
fn test_rewrite_only_newest_keeps_older_ids() -> Result<()> {
    let (_dir, repo) = repo_with_history()?;
    let before = repo.commits_in_range("--root")?;

    let replacements = HashMap::from([(
        before[2].hash.clone(),
        "docs: explain config.json keys".to_string(),
    )]);
    let result = rewrite_messages(&repo, &replacements)?.expect("something to rewrite");
    assert_eq!(result.rebuilt, 1);

    let after = repo.commits_in_range("--root")?;
    assert_eq!(after[0].hash, before[0].hash);
    assert_eq!(after[1].hash, before[1].hash);
    assert_eq!(after[2].subject(), "docs: explain config.json keys");
    Ok(())
}

#[test]
fn test_backup_branch_points_at_old_head() -> Result<()> {
    let (dir, repo) = repo_with_history()?;
    let before = repo.commits_in_range("--root")?;

    create_backup(&repo, "backup/test")?;
    let replacements = HashMap::from([(before[0].hash.clone(), "chore: start".to_string())]);
    rewrite_messages(&repo, &replacements)?;

    assert_eq!(git(dir.path(), &["rev-parse", "backup/test"]), before[2].hash);
    assert_ne!(git(dir.path(), &["rev-parse", "HEAD"]), before[2].hash);

    // 同名备份分支不能覆盖
    let err = create_backup(&repo, "backup/test").unwrap_err();
    assert!(matches!(err, AbError::InvalidInput(_)));
    Ok(())
}

#[test]
fn test_empty_replacements_do_nothing() -> Result<()> {
    let (dir, repo) = repo_with_history()?;
    let head = git(dir.path(), &["rev-parse", "HEAD"]);

    assert_eq!(rewrite_messages(&repo, &HashMap::new())?, None);
    assert_eq!(git(dir.path(), &["rev-parse", "HEAD"]), head);
    Ok(())
}

#[test]
fn test_detached_head_is_refused() -> Result<()> {
    let (dir, repo) = repo_with_history()?;
    let before = repo.commits_in_range("--root")?;
    git(dir.path(), &["checkout", "-q", "--detach", "HEAD"]);

    let replacements = HashMap::from([(before[0].hash.clone(), "chore: start".to_string())]);
    let err = rewrite_messages(&repo, &replacements).unwrap_err();
    assert!(matches!(err, AbError::InvalidInput(_)));
    Ok(())
}
