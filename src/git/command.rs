use std::path::Path;
use std::process::{Command, Output};

use crate::error::{AbError, Result};
use crate::git::StatusSummary;

/// Run `git <args>` inside `dir` and return stdout.
///
/// Goes through the git CLI rather than git2 so hooks, GPG signing and
/// every git config setting apply.
pub fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = raw_git(dir, args)?;
    if !output.status.success() {
        return Err(AbError::GitCommand(failure_message(args, &output)));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Like [`run_git`] but a non-zero exit yields `None`.
pub fn try_git(dir: &Path, args: &[&str]) -> Result<Option<String>> {
    let output = raw_git(dir, args)?;
    if output.status.success() {
        Ok(Some(String::from_utf8_lossy(&output.stdout).to_string()))
    } else {
        tracing::debug!("git {} failed: {}", args.join(" "), failure_message(args, &output));
        Ok(None)
    }
}

/// Run git with extra environment variables (used by commit-tree).
pub fn run_git_with_env(dir: &Path, args: &[&str], envs: &[(&str, String)]) -> Result<String> {
    tracing::debug!("git {}", args.join(" "));
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .envs(envs.iter().map(|(k, v)| (*k, v.as_str())))
        .output()?;
    if !output.status.success() {
        return Err(AbError::GitCommand(failure_message(args, &output)));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn raw_git(dir: &Path, args: &[&str]) -> Result<Output> {
    tracing::debug!("git {}", args.join(" "));
    Ok(Command::new("git").args(args).current_dir(dir).output()?)
}

fn failure_message(args: &[&str], output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = if stderr.trim().is_empty() {
        // 有些 git 错误输出到 stdout
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    } else {
        stderr.trim().to_string()
    };
    format!("git {}: {}", args.first().copied().unwrap_or(""), detail)
}

pub fn commit(dir: &Path, message: &str) -> Result<()> {
    run_git(dir, &["commit", "-m", message])?;
    Ok(())
}

pub fn stage_all(dir: &Path) -> Result<()> {
    run_git(dir, &["add", "-A"])?;
    Ok(())
}

pub fn create_branch(dir: &Path, name: &str, checkout: bool) -> Result<()> {
    if checkout {
        run_git(dir, &["checkout", "-b", name])?;
    } else {
        run_git(dir, &["branch", name])?;
    }
    Ok(())
}

/// Parse `git status --porcelain` output.
pub fn parse_porcelain(output: &str) -> StatusSummary {
    let mut summary = StatusSummary::default();
    for line in output.lines() {
        if line.len() < 4 {
            continue;
        }
        let mut chars = line.chars();
        let index = chars.next().unwrap_or(' ');
        let worktree = chars.next().unwrap_or(' ');
        let path = line[3..].to_string();

        if index == '?' && worktree == '?' {
            summary.untracked.push(path);
            continue;
        }
        if index != ' ' && index != '!' {
            summary.staged.push(path.clone());
        }
        if worktree != ' ' && worktree != '!' {
            summary.modified.push(path);
        }
    }
    summary
}

/// Non-empty lines of command output.
pub fn lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
