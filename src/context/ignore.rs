// .aiignore 支持
//
// gitignore 语法：注释、空行、`!` 取反、前导 `/` 锚定、尾部 `/` 仅匹配目录。
// 按出现顺序匹配，最后一个命中的规则生效。

use std::fs;
use std::path::{Path, PathBuf};

use git2::Repository;
use globset::{GlobBuilder, GlobMatcher};

use crate::constants;
use crate::error::Result;

#[derive(Debug, Clone)]
struct Rule {
    matcher: GlobMatcher,
    negated: bool,
    dir_only: bool,
}

/// Compiled `.aiignore` patterns.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<Rule>,
    sources: Vec<PathBuf>,
}

impl IgnoreRules {
    /// Collect `.aiignore` files from `start` up to the git root (or the
    /// filesystem root) and compile them, outermost first.
    pub fn discover(start: &Path) -> Result<Self> {
        let files = find_ignore_files(start);
        let mut rules = Self::default();
        for file in files.iter().rev() {
            match fs::read_to_string(file) {
                Ok(content) => rules.add_patterns(&content)?,
                Err(e) => tracing::warn!("Error reading {}: {}", file.display(), e),
            }
        }
        rules.sources = files.into_iter().rev().collect();
        Ok(rules)
    }

    /// Compile patterns from text in gitignore syntax.
    pub fn from_patterns(text: &str) -> Result<Self> {
        let mut rules = Self::default();
        rules.add_patterns(text)?;
        Ok(rules)
    }

    /// `.aiignore` files that contributed, outermost first.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn add_patterns(&mut self, text: &str) -> Result<()> {
        for line in text.lines() {
            if let Some(rule) = compile_line(line)? {
                self.rules.push(rule);
            }
        }
        Ok(())
    }

    /// Whether `relative` (a path relative to the walk base) is ignored.
    ///
    /// A path is also ignored when one of its parent directories is.
    pub fn is_ignored(&self, relative: &Path, is_dir: bool) -> bool {
        if self.rules.is_empty() {
            return false;
        }
        let mut current = PathBuf::new();
        let components: Vec<_> = relative.components().collect();
        for (i, component) in components.iter().enumerate() {
            current.push(component);
            let last = i + 1 == components.len();
            let component_is_dir = !last || is_dir;
            if self.matches(&current, component_is_dir) {
                return true;
            }
        }
        false
    }

    fn matches(&self, path: &Path, is_dir: bool) -> bool {
        let mut ignored = false;
        for rule in &self.rules {
            if rule.dir_only && !is_dir {
                continue;
            }
            if rule.matcher.is_match(path) {
                ignored = !rule.negated;
            }
        }
        ignored
    }
}

fn compile_line(line: &str) -> Result<Option<Rule>> {
    let line = line.trim_end();
    if line.trim().is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (negated, pattern) = match line.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, line.strip_prefix('\\').unwrap_or(line)),
    };
    let (dir_only, pattern) = match pattern.strip_suffix('/') {
        Some(rest) => (true, rest),
        None => (false, pattern),
    };
    let (anchored, pattern) = match pattern.strip_prefix('/') {
        Some(rest) => (true, rest),
        // 中间含 `/` 的模式相对于根目录
        None => (pattern.contains('/'), pattern),
    };
    if pattern.is_empty() {
        return Ok(None);
    }

    let glob = if anchored || pattern.starts_with("**/") {
        pattern.to_string()
    } else {
        format!("**/{}", pattern)
    };

    let matcher = GlobBuilder::new(&glob)
        .literal_separator(true)
        .build()?
        .compile_matcher();

    Ok(Some(Rule {
        matcher,
        negated,
        dir_only,
    }))
}

fn find_ignore_files(start: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
    let git_root = Repository::discover(&start).ok().and_then(|repo| {
        repo.workdir()
            .map(|w| w.canonicalize().unwrap_or_else(|_| w.to_path_buf()))
    });
    for dir in start.ancestors() {
        let candidate = dir.join(constants::context::IGNORE_FILE);
        if candidate.is_file() {
            found.push(candidate);
        }
        if git_root.as_deref() == Some(dir) {
            break;
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_basic_patterns() {
        let rules = IgnoreRules::from_patterns("# comment\n\n*.log\nbuild/\n").unwrap();
        assert!(rules.is_ignored(Path::new("app.log"), false));
        assert!(rules.is_ignored(Path::new("src/deep/app.log"), false));
        assert!(rules.is_ignored(Path::new("build"), true));
        assert!(rules.is_ignored(Path::new("build/out.txt"), false));
        assert!(!rules.is_ignored(Path::new("src/main.rs"), false));
    }

    #[test]
    fn test_dir_only_does_not_match_files() {
        let rules = IgnoreRules::from_patterns("cache/\n").unwrap();
        assert!(!rules.is_ignored(Path::new("cache"), false));
        assert!(rules.is_ignored(Path::new("cache"), true));
    }

    #[test]
    fn test_negation_last_match_wins() {
        let rules = IgnoreRules::from_patterns("*.md\n!README.md\n").unwrap();
        assert!(rules.is_ignored(Path::new("notes.md"), false));
        assert!(!rules.is_ignored(Path::new("README.md"), false));
    }

    #[test]
    fn test_anchored_pattern() {
        let rules = IgnoreRules::from_patterns("/secret.txt\ndocs/*.tmp\n").unwrap();
        assert!(rules.is_ignored(Path::new("secret.txt"), false));
        assert!(!rules.is_ignored(Path::new("sub/secret.txt"), false));
        assert!(rules.is_ignored(Path::new("docs/a.tmp"), false));
        assert!(!rules.is_ignored(Path::new("x/docs/a.tmp"), false));
    }

    #[test]
    fn test_discover_stops_at_git_root() {
        let outer = TempDir::new().unwrap();
        fs::write(outer.path().join(".aiignore"), "outer.txt\n").unwrap();
        let repo = outer.path().join("repo");
        Repository::init(&repo).unwrap();
        fs::write(repo.join(".aiignore"), "*.log\n").unwrap();
        let sub = repo.join("sub");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join(".aiignore"), "!keep.log\n").unwrap();

        let rules = IgnoreRules::discover(&sub).unwrap();
        assert_eq!(rules.sources().len(), 2);
        assert!(rules.is_ignored(Path::new("a.log"), false));
        assert!(!rules.is_ignored(Path::new("keep.log"), false));
        assert!(!rules.is_ignored(Path::new("outer.txt"), false));
    }

    #[test]
    fn test_bare_git_directory_is_not_a_repository() {
        // 只有空的 .git 目录不是仓库，继续向上收集
        let outer = TempDir::new().unwrap();
        Repository::init(outer.path()).unwrap();
        fs::write(outer.path().join(".aiignore"), "outer.txt\n").unwrap();
        let fake = outer.path().join("fake");
        fs::create_dir_all(fake.join(".git")).unwrap();
        fs::write(fake.join(".aiignore"), "*.log\n").unwrap();

        let rules = IgnoreRules::discover(&fake).unwrap();
        assert_eq!(rules.sources().len(), 2);
        assert!(rules.is_ignored(Path::new("outer.txt"), false));
    }
}
