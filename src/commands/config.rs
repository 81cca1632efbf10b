use std::path::Path;

use colored::Colorize;

use crate::cli::ConfigAction;
use crate::config::ConfigStore;
use crate::config::defaults::{default_document, default_for};
use crate::config::ConfigValue;
use crate::error::{AbError, Result};
use crate::history::HistoryRecorder;
use crate::ui;

/// 编辑后 JSON 不合法时的选择
enum EditAction {
    Retry, // 重新编辑
    Keep,  // 保留错误内容并报错
}

/// `ab config <action>`
///
/// 配置在各个子命令里按需加载：`init` 和 `path` 在文件损坏时也要能用。
pub fn run(action: &ConfigAction, path: &Path, colored: bool) -> Result<()> {
    match action {
        ConfigAction::Show => show(path, colored),
        ConfigAction::Get { key } => get(path, key),
        ConfigAction::Set { key, value } => set(path, key, value, colored),
        ConfigAction::Init { force } => init(path, *force, colored),
        ConfigAction::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigAction::Edit => edit(path, colored),
        ConfigAction::ListKeys => {
            for key in ConfigStore::list_keys() {
                println!("{}", key);
            }
            Ok(())
        }
        ConfigAction::ClearHistory { yes } => clear_history(path, *yes, colored),
    }
}

fn show(path: &Path, colored: bool) -> Result<()> {
    let store = ConfigStore::open_at(path)?;
    if store.file_exists() {
        println!("{}", to_pretty_json(store.document())?);
        return Ok(());
    }

    ui::warning(
        &format!("No configuration file found at {}", path.display()),
        colored,
    );
    println!("Using default configuration:");
    println!("{}", to_pretty_json(&default_document())?);
    println!();
    let hint = "Run 'ab config init' to create the file";
    if colored {
        println!("{}", hint.dimmed());
    } else {
        println!("{}", hint);
    }
    Ok(())
}

fn get(path: &Path, key: &str) -> Result<()> {
    let store = ConfigStore::open_at(path)?;
    let value = store
        .get(key)
        .cloned()
        .or_else(|| default_for(key))
        .ok_or_else(|| AbError::UnknownConfigKey(key.to_string()))?;

    match value {
        ConfigValue::Map(_) | ConfigValue::List(_) => println!("{}", to_pretty_json(&value)?),
        other => println!("{}", other.display_value()),
    }
    Ok(())
}

fn set(path: &Path, key: &str, raw: &str, colored: bool) -> Result<()> {
    let mut store = ConfigStore::open_at(path)?;
    let value = store.set(key, raw)?;
    ui::success(
        &format!("Set {} = {}", key, value.display_value()),
        colored,
    );
    Ok(())
}

fn init(path: &Path, force: bool, colored: bool) -> Result<()> {
    // 不读旧文件：它可能正是需要被覆盖的损坏文件
    let mut store = ConfigStore::from_document(path, default_document());
    let backup = store.init(force)?;
    if let Some(backup) = backup {
        ui::info(
            &format!("Previous configuration saved to {}", backup.display()),
            colored,
        );
    }
    ui::success(
        &format!("Configuration written to {}", path.display()),
        colored,
    );
    Ok(())
}

fn edit(path: &Path, colored: bool) -> Result<()> {
    if !path.exists() {
        let mut store = ConfigStore::from_document(path, default_document());
        store.init(false)?;
        ui::info(
            &format!("Created default configuration at {}", path.display()),
            colored,
        );
    }

    loop {
        ui::info(&format!("Editing {}", path.display()), colored);
        ui::edit_file(path)?;

        match ConfigStore::open_at(path) {
            Ok(_) => {
                ui::success("Configuration updated", colored);
                return Ok(());
            }
            Err(e) => {
                println!();
                ui::error(&format!("Validation failed: {}", e), colored);
                println!();
                match prompt_edit_action()? {
                    EditAction::Retry => continue,
                    EditAction::Keep => return Err(e),
                }
            }
        }
    }
}

fn prompt_edit_action() -> Result<EditAction> {
    let choice = ui::select(
        "What would you like to do?",
        &["Edit again", "Leave the file as it is"],
        0,
    )?;
    Ok(match choice {
        0 => EditAction::Retry,
        _ => EditAction::Keep,
    })
}

fn clear_history(path: &Path, yes: bool, colored: bool) -> Result<()> {
    let store = ConfigStore::open_at(path)?;
    let recorder = HistoryRecorder::from_config(&store);

    if !recorder.dir().exists() {
        ui::info("No history directory found.", colored);
        return Ok(());
    }
    let count = recorder.file_count()?;
    if count == 0 {
        ui::info("No history files found.", colored);
        return Ok(());
    }

    if !yes && !ui::confirm(&format!("Delete {} history files?", count), false)? {
        return Err(AbError::UserCancelled);
    }

    let removed = recorder.clear()?;
    ui::success(&format!("Deleted {} history files.", removed), colored);
    Ok(())
}

fn to_pretty_json(value: &ConfigValue) -> Result<String> {
    let json: serde_json::Value = value.clone().into();
    Ok(serde_json::to_string_pretty(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_set_then_get_roundtrip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        set(&path, "models.small", "vendor/tiny", false).unwrap();
        let store = ConfigStore::open_at(&path).unwrap();
        assert_eq!(
            store.get("models.small"),
            Some(&ConfigValue::from("vendor/tiny"))
        );
    }

    #[test]
    fn test_init_refuses_existing_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = init(&path, false, false).unwrap_err();
        assert!(err.to_string().contains("--force"));

        init(&path, true, false).unwrap();
        assert!(dir.path().join("config.json.bak").exists());
        assert!(ConfigStore::open_at(&path).is_ok());
    }

    #[test]
    fn test_get_unknown_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let err = get(&path, "global.nope").unwrap_err();
        assert!(matches!(err, AbError::UnknownConfigKey(_)));
    }

    #[test]
    fn test_clear_history_without_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let history = dir.path().join("history");
        set(&path, "history.directory", history.to_str().unwrap(), false).unwrap();

        clear_history(&path, true, false).unwrap();

        std::fs::create_dir_all(&history).unwrap();
        std::fs::write(history.join("index.json"), "{}").unwrap();
        clear_history(&path, true, false).unwrap();
        assert!(!history.join("index.json").exists());
    }
}
