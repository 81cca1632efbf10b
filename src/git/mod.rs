pub mod command;
pub mod diff;
pub mod repository;
pub mod rewrite;

use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::error::Result;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Git commit 信息
#[derive(Debug, Clone, PartialEq)]
pub struct CommitInfo {
    pub hash: String,
    pub short_hash: String,
    /// 完整 message（已去除尾部空白）
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: DateTime<Local>,
    pub parent_count: usize,
}

impl CommitInfo {
    /// message 的第一行
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    pub fn is_merge(&self) -> bool {
        self.parent_count > 1
    }
}

/// 工作区状态摘要（`git status --porcelain`）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub staged: Vec<String>,
    pub modified: Vec<String>,
    pub untracked: Vec<String>,
}

impl StatusSummary {
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty() && self.modified.is_empty() && self.untracked.is_empty()
    }
}

/// Diff 统计信息
///
/// ```
/// use ab_cli::git::DiffStats;
///
/// let stats = DiffStats {
///     files_changed: vec!["src/main.rs".to_string()],
///     insertions: 42,
///     deletions: 13,
/// };
/// assert_eq!(stats.files_changed.len(), 1);
/// ```
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DiffStats {
    pub files_changed: Vec<String>,
    pub insertions: usize,
    pub deletions: usize,
}

/// Git 操作的统一接口
///
/// 主要实现：[`GitRepository`](repository::GitRepository)。
/// 命令层只依赖这个 trait，测试中可以用 `MockGitOperations` 替换。
#[cfg_attr(any(test, feature = "test-utils"), automock)]
pub trait GitOperations {
    /// 工作区根目录
    fn root(&self) -> PathBuf;

    /// 当前分支名；detached HEAD 或空仓库返回 `None`
    fn current_branch(&self) -> Result<Option<String>>;

    /// 本地分支、远程分支（`origin/main`）或任意可解析的 revision
    fn branch_exists(&self, name: &str) -> Result<bool>;

    /// 仓库是否还没有任何 commit
    fn is_empty(&self) -> Result<bool>;

    /// `git diff --cached`
    fn staged_diff(&self) -> Result<String>;

    /// `git diff --cached --name-status`
    fn staged_name_status(&self) -> Result<String>;

    fn status(&self) -> Result<StatusSummary>;

    /// 已跟踪文件存在未提交（staged 或 unstaged）的修改
    fn has_uncommitted_changes(&self) -> Result<bool>;

    /// `git log --oneline -<count>`，用作 commit 风格参考
    fn recent_commits(&self, count: usize) -> Result<String>;

    /// `git log -1 --oneline`
    fn last_commit_summary(&self) -> Result<String>;

    /// 范围内的 commit，最旧的在前；`--root` 表示 HEAD 的全部历史
    fn commits_in_range(&self, range: &str) -> Result<Vec<CommitInfo>>;

    /// HEAD 可达的 commit 总数
    fn commit_count(&self) -> Result<usize>;

    /// `git describe --tags --abbrev=0`
    fn latest_tag(&self) -> Result<Option<String>>;

    /// commit 修改的文件（带状态）
    fn commit_files(&self, hash: &str) -> Result<String>;

    /// commit 的 patch；root commit 与空树比较
    fn commit_diff(&self, hash: &str) -> Result<String>;

    /// `git diff <base>...HEAD`
    fn diff_against(&self, base: &str) -> Result<String>;

    /// `git diff --name-status <base>...HEAD`
    fn files_changed_against(&self, base: &str) -> Result<String>;

    /// `git log --oneline <base>..HEAD`
    fn log_since(&self, base: &str) -> Result<String>;

    /// `git rev-list --count <base>..HEAD`
    fn commits_ahead(&self, base: &str) -> Result<usize>;

    /// 包含该 commit 的远程分支
    fn remote_branches_containing(&self, hash: &str) -> Result<Vec<String>>;

    fn has_remotes(&self) -> Result<bool>;

    /// 带冲突标记的文件（`--diff-filter=U`）
    fn conflicted_files(&self) -> Result<Vec<String>>;

    /// `git add -A`
    fn stage_all(&self) -> Result<()>;

    /// `git commit -m`，保留 hooks 与签名配置
    fn commit(&self, message: &str) -> Result<()>;

    /// 新建分支；`checkout` 为 true 时切换过去
    fn create_branch(&self, name: &str, checkout: bool) -> Result<()>;
}
