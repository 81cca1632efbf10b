use crate::git::DiffStats;

/// 从 `diff --git a/x b/x` 头部提取文件名
fn filename_from_header(line: &str) -> Option<String> {
    let rest = line.strip_prefix("diff --git ")?;

    // 通过 " b/" 定位 a/ 与 b/ 的边界，避免路径中的空格被截断
    if let Some(b_pos) = rest.find(" b/") {
        return rest[..b_pos].strip_prefix("a/").map(str::to_string);
    }

    // 带引号的路径："a/path with spaces.rs" "b/path with spaces.rs"
    if let Some(stripped) = rest.strip_prefix('"')
        && let Some(end) = stripped.find('"')
    {
        return stripped[..end].strip_prefix("a/").map(str::to_string);
    }

    rest.split_whitespace()
        .next()
        .and_then(|s| s.strip_prefix("a/"))
        .map(str::to_string)
}

/// 统计 unified diff 的文件列表与增删行数
pub fn parse_diff_stats(diff: &str) -> DiffStats {
    let mut stats = DiffStats::default();

    for line in diff.lines() {
        if line.starts_with("diff --git") {
            if let Some(filename) = filename_from_header(line) {
                stats.files_changed.push(filename);
            }
        } else if line.starts_with('+') && !line.starts_with("+++") {
            stats.insertions += 1;
        } else if line.starts_with('-') && !line.starts_with("---") {
            stats.deletions += 1;
        }
    }

    stats
}

/// `git diff --name-status` 中的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameStatus {
    pub status: char,
    pub path: String,
}

/// 解析 `--name-status` 输出；重命名取新路径
pub fn parse_name_status(output: &str) -> Vec<NameStatus> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split('\t');
            let status = parts.next()?.chars().next()?;
            let path = parts.last()?.to_string();
            Some(NameStatus { status, path })
        })
        .collect()
}

/// 截断到 `max_chars` 个字符（按字符边界）
pub fn preview(diff: &str, max_chars: usize) -> String {
    match diff.char_indices().nth(max_chars) {
        Some((idx, _)) => diff[..idx].to_string(),
        None => diff.to_string(),
    }
}
