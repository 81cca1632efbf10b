use colored::Colorize;

use crate::git::DiffStats;

/// 显示成功消息（绿色 ✓）
pub fn success(msg: &str, colored: bool) {
    if colored {
        println!("{} {}", "✓".green().bold(), msg.green());
    } else {
        println!("✓ {}", msg);
    }
}

/// 显示错误消息（红色 ✗，stderr）
pub fn error(msg: &str, colored: bool) {
    if colored {
        eprintln!("{} {}", "✗".red().bold(), msg.red());
    } else {
        eprintln!("✗ {}", msg);
    }
}

/// 显示警告消息（黄色 ⚠）
pub fn warning(msg: &str, colored: bool) {
    if colored {
        println!("{} {}", "⚠".yellow().bold(), msg.yellow());
    } else {
        println!("⚠ {}", msg);
    }
}

/// 显示信息消息（蓝色 ℹ）
pub fn info(msg: &str, colored: bool) {
    if colored {
        println!("{} {}", "ℹ".blue().bold(), msg.blue());
    } else {
        println!("ℹ {}", msg);
    }
}

/// 显示步骤提示（灰色）
pub fn step(step: &str, msg: &str, colored: bool) {
    if colored {
        println!(
            "{} {}",
            format!("[{}]", step).bright_black().bold(),
            msg.bright_black()
        );
    } else {
        println!("[{}] {}", step, msg);
    }
}

/// 小节标题，例如 `=== GENERATED SCRIPT ===`
pub fn header(title: &str, colored: bool) {
    let line = format!("=== {} ===", title);
    if colored {
        println!("{}", line.cyan().bold());
    } else {
        println!("{}", line);
    }
}

/// 格式化 diff 统计信息
pub fn format_diff_stats(stats: &DiffStats, colored: bool) -> String {
    let plural = |n: usize, one: &str, many: &str| {
        if n == 1 {
            format!("1 {}", one)
        } else {
            format!("{} {}", n, many)
        }
    };
    let files = plural(stats.files_changed.len(), "file", "files");
    let insertions = plural(stats.insertions, "insertion(+)", "insertions(+)");
    let deletions = plural(stats.deletions, "deletion(-)", "deletions(-)");

    if colored {
        format!(
            "{} changed, {}, {}",
            files.bold(),
            insertions.green(),
            deletions.red()
        )
    } else {
        format!("{} changed, {}, {}", files, insertions, deletions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_diff_stats_plain() {
        let stats = DiffStats {
            files_changed: vec!["a".into()],
            insertions: 1,
            deletions: 4,
        };
        assert_eq!(
            format_diff_stats(&stats, false),
            "1 file changed, 1 insertion(+), 4 deletions(-)"
        );
    }
}
