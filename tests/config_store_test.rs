//! ConfigStore 与模型选择的集成测试
//!
//! 配置文件写在临时目录里，环境变量覆盖通过 EnvGuard 设置并在 Drop 时恢复。
//! 所有用到 open_at 的测试都读取 AB__* 环境变量，因此统一串行执行。

use std::env;
use std::fs;

use ab_cli::config::{ConfigStore, ConfigValue, Tier, pick};
use ab_cli::error::AbError;
use pretty_assertions::assert_eq;
use serde_json::json;
use serial_test::serial;
use tempfile::TempDir;

struct EnvGuard {
    key: String,
    original: Option<String>,
}

impl EnvGuard {
    fn set(key: &str, value: &str) -> Self {
        let original = env::var(key).ok();
        // SAFETY: 测试通过 serial_test 串行执行
        unsafe { env::set_var(key, value) };
        Self {
            key: key.to_string(),
            original,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        // SAFETY: 同上
        match &self.original {
            Some(v) => unsafe { env::set_var(&self.key, v) },
            None => unsafe { env::remove_var(&self.key) },
        }
    }
}

fn write_config(dir: &TempDir, value: serde_json::Value) -> std::path::PathBuf {
    let path = dir.path().join("config.json");
    fs::write(&path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
    path
}

fn scenario_file(dir: &TempDir) -> std::path::PathBuf {
    write_config(
        dir,
        json!({
            "version": "1.0",
            "global": {"language": "en"},
            "models": {
                "small": "A", "medium": "B", "large": "C", "default": "D",
                "thresholds": {"small_max_tokens": 128000, "medium_max_tokens": 256000}
            },
            "commands": {"explain": {"language": "fr"}}
        }),
    )
}

// ========== 模型选择 ==========

#[test]
#[serial]
fn test_selection_follows_file_on_disk() {
    let dir = TempDir::new().unwrap();
    let config = ConfigStore::open_at(scenario_file(&dir)).unwrap();

    assert_eq!(pick(128_000, &config).model_id, "A");
    assert_eq!(pick(128_001, &config).model_id, "B");
    let large = pick(300_000, &config);
    assert_eq!(large.model_id, "C");
    assert_eq!(large.tier, Tier::Large);
}

#[test]
#[serial]
fn test_threshold_change_moves_the_boundary() {
    let dir = TempDir::new().unwrap();
    let mut config = ConfigStore::open_at(scenario_file(&dir)).unwrap();

    config
        .set("models.thresholds.small_max_tokens", "1000")
        .unwrap();
    assert_eq!(pick(1_000, &config).model_id, "A");
    assert_eq!(pick(1_001, &config).model_id, "B");

    // 重新打开文件，结果一致
    let reopened = ConfigStore::open_at(config.path()).unwrap();
    assert_eq!(reopened.thresholds(), (1000, 256000));
}

#[test]
#[serial]
fn test_env_override_changes_selection_but_is_not_persisted() {
    let dir = TempDir::new().unwrap();
    let path = scenario_file(&dir);
    let _guard = EnvGuard::set("AB__MODELS__SMALL", "env/override");

    let mut config = ConfigStore::open_at(&path).unwrap();
    assert_eq!(pick(10, &config).model_id, "env/override");
    assert_eq!(
        config.get("models.small"),
        Some(&ConfigValue::from("A"))
    );

    config.set("global.language", "de").unwrap();
    let on_disk: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk["models"]["small"], json!("A"));
    assert_eq!(on_disk["global"]["language"], json!("de"));
    // 写入后仍然叠加环境变量
    assert_eq!(pick(10, &config).model_id, "env/override");
}

// ========== 语言解析 ==========

#[test]
#[serial]
fn test_language_precedence() {
    let dir = TempDir::new().unwrap();
    let config = ConfigStore::open_at(scenario_file(&dir)).unwrap();

    assert_eq!(config.language(Some("explain"), None), "fr");
    assert_eq!(config.language(Some("explain"), Some("ja")), "ja");
    assert_eq!(config.language(Some("auto-commit"), None), "en");
    // 空字符串等于没给
    assert_eq!(config.language(Some("auto-commit"), Some("")), "en");
}

#[test]
#[serial]
fn test_env_language_override() {
    let dir = TempDir::new().unwrap();
    let _guard = EnvGuard::set("AB__GLOBAL__LANGUAGE", "pt-br");
    let config = ConfigStore::open_at(scenario_file(&dir)).unwrap();

    assert_eq!(config.language(None, None), "pt-br");
    // 命令级设置仍然优先
    assert_eq!(config.language(Some("explain"), None), "fr");
}

// ========== 文件生命周期 ==========

#[test]
#[serial]
fn test_init_force_keeps_backup() {
    let dir = TempDir::new().unwrap();
    let path = scenario_file(&dir);
    let original = fs::read_to_string(&path).unwrap();

    let mut config = ConfigStore::open_at(&path).unwrap();
    assert!(matches!(config.init(false), Err(AbError::Config(_))));

    let backup = config.init(true).unwrap().expect("backup path");
    assert_eq!(fs::read_to_string(&backup).unwrap(), original);
    assert!(backup.to_string_lossy().ends_with("config.json.bak"));

    let fresh = ConfigStore::open_at(&path).unwrap();
    assert_eq!(fresh.get("models.small"), config.get("models.small"));
    assert_ne!(fresh.get("models.small"), Some(&ConfigValue::from("A")));
}

#[test]
#[serial]
fn test_corrupt_file_blocks_writes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, "{ not json").unwrap();

    let err = ConfigStore::open_at(&path).unwrap_err();
    assert!(matches!(err, AbError::ConfigCorrupt { .. }));
    assert!(err.suggestion().is_some());
    assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
}

#[test]
#[serial]
fn test_set_on_missing_file_writes_defaults_plus_value() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let mut config = ConfigStore::open_at(&path).unwrap();
    assert!(!config.file_exists());
    config.set("commands.passgenerator.default_length", "24").unwrap();

    let reopened = ConfigStore::open_at(&path).unwrap();
    assert!(reopened.file_exists());
    assert_eq!(
        reopened.command_int("passgenerator", "default_length", None),
        Some(24)
    );
    assert_eq!(
        reopened.get("version"),
        Some(&ConfigValue::from("1.0"))
    );
    // 其余默认值也一起写入
    assert!(reopened.get("models.default").is_some());
}

#[test]
#[serial]
fn test_rejected_threshold_leaves_file_alone() {
    let dir = TempDir::new().unwrap();
    let path = scenario_file(&dir);
    let before = fs::read_to_string(&path).unwrap();

    let mut config = ConfigStore::open_at(&path).unwrap();
    let err = config
        .set("models.thresholds.medium_max_tokens", "100")
        .unwrap_err();
    assert!(matches!(
        err,
        AbError::ThresholdInvariantViolation {
            small: 128000,
            medium: 100
        }
    ));
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
    assert_eq!(config.thresholds(), (128000, 256000));
}
