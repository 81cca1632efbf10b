use std::path::Path;

use crate::error::Result;

/// 用系统编辑器打开文件，阻塞到编辑器退出
///
/// `edit` crate 按 $VISUAL > $EDITOR > 平台默认列表选择编辑器。
pub fn edit_file(path: &Path) -> Result<()> {
    edit::edit_file(path)?;
    Ok(())
}
