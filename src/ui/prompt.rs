use inquire::{Confirm, Select, Text};

use crate::error::Result;

/// 交互式确认提示；Esc / Ctrl-C 映射为 `UserCancelled`
pub fn confirm(message: &str, default: bool) -> Result<bool> {
    Ok(Confirm::new(message).with_default(default).prompt()?)
}

/// 单选；返回所选项的下标
pub fn select(message: &str, options: &[&str], default: usize) -> Result<usize> {
    let choice = Select::new(message, options.to_vec())
        .with_starting_cursor(default)
        .raw_prompt()?;
    Ok(choice.index)
}

/// 单行文本输入
pub fn text(message: &str, default: Option<&str>) -> Result<String> {
    let mut prompt = Text::new(message);
    if let Some(default) = default {
        prompt = prompt.with_default(default);
    }
    Ok(prompt.prompt()?)
}
