use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};
use git2::{Commit, ErrorCode, Repository, Sort};

use crate::error::{AbError, Result};
use crate::git::command::{self, run_git, try_git};
use crate::git::{CommitInfo, GitOperations, StatusSummary};

pub struct GitRepository {
    repo: Repository,
    root: PathBuf,
}

impl GitRepository {
    /// 打开当前目录所在的 git 仓库
    pub fn open() -> Result<Self> {
        Self::discover(Path::new("."))
    }

    /// 从 `path` 向上查找仓库
    pub fn discover(path: &Path) -> Result<Self> {
        let repo = match Repository::discover(path) {
            Ok(repo) => repo,
            Err(e) if e.code() == ErrorCode::NotFound => return Err(AbError::NotInGitRepo),
            Err(e) => return Err(e.into()),
        };
        let root = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| AbError::GitCommand("bare repositories are not supported".into()))?;
        Ok(Self { repo, root })
    }

    /// 底层 git2 仓库，供历史重写读取 tree / 签名
    pub fn inner(&self) -> &Repository {
        &self.repo
    }

    pub fn commit_info(&self, rev: &str) -> Result<CommitInfo> {
        let commit = self.repo.revparse_single(rev)?.peel_to_commit()?;
        self.to_commit_info(&commit)
    }

    fn to_commit_info(&self, commit: &Commit) -> Result<CommitInfo> {
        let author = commit.author();
        let seconds = author.when().seconds();
        let timestamp: DateTime<Local> = Local
            .timestamp_opt(seconds, 0)
            .single()
            .unwrap_or_else(|| {
                tracing::warn!("Invalid timestamp {} on commit {}", seconds, commit.id());
                Local::now()
            });

        let short_hash = commit
            .as_object()
            .short_id()
            .ok()
            .and_then(|buf| buf.as_str().map(str::to_string))
            .unwrap_or_else(|| commit.id().to_string().chars().take(7).collect());

        Ok(CommitInfo {
            hash: commit.id().to_string(),
            short_hash,
            message: String::from_utf8_lossy(commit.message_bytes())
                .trim_end()
                .to_string(),
            author_name: author.name().unwrap_or("Unknown").to_string(),
            author_email: author.email().unwrap_or("").to_string(),
            timestamp,
            parent_count: commit.parent_count(),
        })
    }
}

impl GitOperations for GitRepository {
    fn root(&self) -> PathBuf {
        self.root.clone()
    }

    fn current_branch(&self) -> Result<Option<String>> {
        // Unborn branch 没有真正的分支信息
        if self.is_empty()? {
            return Ok(None);
        }
        let head = self.repo.head()?;
        if head.is_branch() {
            Ok(head.shorthand().map(|s| s.to_string()))
        } else {
            Ok(None)
        }
    }

    fn branch_exists(&self, name: &str) -> Result<bool> {
        Ok(self.repo.revparse_single(name).is_ok())
    }

    fn is_empty(&self) -> Result<bool> {
        match self.repo.head() {
            Ok(_) => Ok(false),
            Err(e) if e.code() == ErrorCode::UnbornBranch => Ok(true),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    fn staged_diff(&self) -> Result<String> {
        run_git(&self.root, &["diff", "--cached"])
    }

    fn staged_name_status(&self) -> Result<String> {
        Ok(run_git(&self.root, &["diff", "--cached", "--name-status"])?
            .trim()
            .to_string())
    }

    fn status(&self) -> Result<StatusSummary> {
        let output = run_git(&self.root, &["status", "--porcelain"])?;
        Ok(command::parse_porcelain(&output))
    }

    fn has_uncommitted_changes(&self) -> Result<bool> {
        let output = run_git(&self.root, &["status", "--porcelain", "--untracked-files=no"])?;
        Ok(!output.trim().is_empty())
    }

    fn recent_commits(&self, count: usize) -> Result<String> {
        let count = format!("-{}", count);
        Ok(try_git(&self.root, &["log", "--oneline", &count])?
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    fn last_commit_summary(&self) -> Result<String> {
        Ok(run_git(&self.root, &["log", "-1", "--oneline"])?
            .trim()
            .to_string())
    }

    fn commits_in_range(&self, range: &str) -> Result<Vec<CommitInfo>> {
        if self.is_empty()? {
            return Ok(Vec::new());
        }

        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
        if range == "--root" {
            revwalk.push_head()?;
        } else if range.contains("..") {
            revwalk.push_range(range).map_err(|e| {
                AbError::InvalidInput(format!("Invalid revision range '{}': {}", range, e))
            })?;
        } else {
            let commit = self
                .repo
                .revparse_single(range)
                .and_then(|obj| obj.peel_to_commit())
                .map_err(|e| {
                    AbError::InvalidInput(format!("Invalid revision '{}': {}", range, e))
                })?;
            revwalk.push(commit.id())?;
        }

        let mut commits = Vec::new();
        for oid in revwalk {
            let commit = self.repo.find_commit(oid?)?;
            commits.push(self.to_commit_info(&commit)?);
        }
        Ok(commits)
    }

    fn commit_count(&self) -> Result<usize> {
        if self.is_empty()? {
            return Ok(0);
        }
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push_head()?;
        Ok(revwalk.count())
    }

    fn latest_tag(&self) -> Result<Option<String>> {
        Ok(try_git(&self.root, &["describe", "--tags", "--abbrev=0"])?
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty()))
    }

    fn commit_files(&self, hash: &str) -> Result<String> {
        Ok(run_git(
            &self.root,
            &["diff-tree", "--no-commit-id", "--name-status", "-r", "--root", hash],
        )?
        .trim()
        .to_string())
    }

    fn commit_diff(&self, hash: &str) -> Result<String> {
        let commit = self.repo.revparse_single(hash)?.peel_to_commit()?;
        if commit.parent_count() == 0 {
            run_git(&self.root, &["diff-tree", "--root", "-p", hash])
        } else {
            run_git(&self.root, &["show", "--format=", "-p", hash])
        }
    }

    fn diff_against(&self, base: &str) -> Result<String> {
        run_git(&self.root, &["diff", &format!("{}...HEAD", base)])
    }

    fn files_changed_against(&self, base: &str) -> Result<String> {
        Ok(
            run_git(&self.root, &["diff", "--name-status", &format!("{}...HEAD", base)])?
                .trim()
                .to_string(),
        )
    }

    fn log_since(&self, base: &str) -> Result<String> {
        Ok(
            run_git(&self.root, &["log", "--oneline", &format!("{}..HEAD", base)])?
                .trim()
                .to_string(),
        )
    }

    fn commits_ahead(&self, base: &str) -> Result<usize> {
        let output = run_git(&self.root, &["rev-list", "--count", &format!("{}..HEAD", base)])?;
        output
            .trim()
            .parse()
            .map_err(|_| AbError::GitCommand(format!("unexpected rev-list output: {}", output)))
    }

    fn remote_branches_containing(&self, hash: &str) -> Result<Vec<String>> {
        Ok(try_git(&self.root, &["branch", "-r", "--contains", hash])?
            .map(|out| command::lines(&out))
            .unwrap_or_default())
    }

    fn has_remotes(&self) -> Result<bool> {
        Ok(!self.repo.remotes()?.is_empty())
    }

    fn conflicted_files(&self) -> Result<Vec<String>> {
        Ok(try_git(&self.root, &["diff", "--name-only", "--diff-filter=U"])?
            .map(|out| command::lines(&out))
            .unwrap_or_default())
    }

    fn stage_all(&self) -> Result<()> {
        command::stage_all(&self.root)
    }

    fn commit(&self, message: &str) -> Result<()> {
        command::commit(&self.root, message)
    }

    fn create_branch(&self, name: &str, checkout: bool) -> Result<()> {
        command::create_branch(&self.root, name, checkout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_repo() -> (TempDir, GitRepository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();
        drop(repo);
        let git_repo = GitRepository::discover(dir.path()).unwrap();
        (dir, git_repo)
    }

    fn commit_file(git_repo: &GitRepository, name: &str, content: &str, message: &str) {
        let repo = &git_repo.repo;
        fs::write(git_repo.root.join(name), content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = repo.signature().unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap();
    }

    #[test]
    fn test_discover_outside_repo() {
        let dir = TempDir::new().unwrap();
        let result = GitRepository::discover(dir.path());
        // 临时目录可能位于某个仓库内部，只在确实找不到时断言
        if let Err(e) = result {
            assert!(matches!(e, AbError::NotInGitRepo));
        }
    }

    #[test]
    fn test_is_empty_and_branch() {
        let (_dir, git_repo) = create_test_repo();
        assert!(git_repo.is_empty().unwrap());
        assert_eq!(git_repo.current_branch().unwrap(), None);
        assert_eq!(git_repo.commit_count().unwrap(), 0);
        assert!(git_repo.commits_in_range("--root").unwrap().is_empty());
    }

    #[test]
    fn test_commits_in_range_oldest_first() {
        let (_dir, git_repo) = create_test_repo();
        commit_file(&git_repo, "a.txt", "1", "first");
        commit_file(&git_repo, "a.txt", "2", "second\n\nbody line");
        commit_file(&git_repo, "a.txt", "3", "third");

        let all = git_repo.commits_in_range("--root").unwrap();
        let subjects: Vec<&str> = all.iter().map(|c| c.subject()).collect();
        assert_eq!(subjects, vec!["first", "second", "third"]);
        assert_eq!(all[1].message, "second\n\nbody line");
        assert_eq!(all[0].parent_count, 0);
        assert!(!all[2].is_merge());

        let last_two = git_repo.commits_in_range("HEAD~2..HEAD").unwrap();
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].subject(), "second");
        assert_eq!(git_repo.commit_count().unwrap(), 3);
    }

    #[test]
    fn test_invalid_range() {
        let (_dir, git_repo) = create_test_repo();
        commit_file(&git_repo, "a.txt", "1", "first");
        let err = git_repo.commits_in_range("HEAD~5..HEAD").unwrap_err();
        assert!(matches!(err, AbError::InvalidInput(_)));
    }

    #[test]
    fn test_branch_exists_and_current() {
        let (_dir, git_repo) = create_test_repo();
        commit_file(&git_repo, "a.txt", "1", "first");
        let branch = git_repo.current_branch().unwrap().unwrap();
        assert!(git_repo.branch_exists(&branch).unwrap());
        assert!(!git_repo.branch_exists("no-such-branch").unwrap());
    }

    #[test]
    fn test_commit_info_short_hash() {
        let (_dir, git_repo) = create_test_repo();
        commit_file(&git_repo, "a.txt", "1", "first");
        let info = git_repo.commit_info("HEAD").unwrap();
        assert!(info.hash.starts_with(&info.short_hash));
        assert_eq!(info.author_name, "Test User");
        assert_eq!(info.author_email, "test@example.com");
    }

    #[test]
    fn test_has_remotes_false() {
        let (_dir, git_repo) = create_test_repo();
        assert!(!git_repo.has_remotes().unwrap());
    }
}
