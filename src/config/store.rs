use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use tempfile::NamedTempFile;

use super::defaults::{self, default_document, default_for};
use super::env::environment_layer;
use super::value::ConfigValue;
use crate::constants;
use crate::error::{AbError, Result};

const THRESHOLDS_KEY: &str = "models.thresholds";
const SMALL_THRESHOLD_KEY: &str = "models.thresholds.small_max_tokens";
const MEDIUM_THRESHOLD_KEY: &str = "models.thresholds.medium_max_tokens";

/// Connection settings for the LLM provider, resolved from `global.*`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiSettings {
    pub api_base: String,
    pub api_key_env: String,
    pub timeout_seconds: u64,
}

/// The user's configuration, loaded once per process and passed by reference.
///
/// Holds two documents:
/// - the *file layer*: what is (or will be) on disk; the default document
///   when no file exists yet
/// - the *effective* document: file layer with `AB__*` environment
///   overrides merged on top
///
/// Only `set` and `init` write to disk, always through a temp file plus
/// rename in the same directory.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    file_exists: bool,
    file: ConfigValue,
    effective: ConfigValue,
}

impl ConfigStore {
    /// Load `~/.ab/config.json`, or the defaults if it does not exist.
    pub fn load() -> Result<Self> {
        Self::open_at(default_path()?)
    }

    /// Load the document at an explicit path.
    pub fn open_at(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let (file, file_exists) = read_document(&path)?;
        let mut store = Self {
            path,
            file_exists,
            file,
            effective: ConfigValue::empty_map(),
        };
        store.effective = merged_with_env(&store.file)?;
        Ok(store)
    }

    /// Build a store around an in-memory document without touching disk
    /// or the environment. Writes still go to `path`.
    pub fn from_document(path: impl Into<PathBuf>, document: ConfigValue) -> Self {
        Self {
            path: path.into(),
            file_exists: false,
            effective: document.clone(),
            file: document,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_exists(&self) -> bool {
        self.file_exists
    }

    /// The file layer (what `show` prints and `set` persists).
    pub fn document(&self) -> &ConfigValue {
        &self.file
    }

    /// File layer plus environment overrides.
    pub fn effective(&self) -> &ConfigValue {
        &self.effective
    }

    /// Raw stored value at a dotted path, without precedence or defaults.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.file.lookup(key)
    }

    /// Resolve the effective value for `key`.
    ///
    /// Checked in order, first non-empty wins:
    /// 1. `cli`
    /// 2. `commands.<command>.<leaf>`
    /// 3. `global.<leaf>` (for keys outside `global`, the key's own path)
    /// 4. the schema default
    ///
    /// `key` may be a bare leaf (`language`) or a dotted path
    /// (`global.language`, `models.small`).
    pub fn resolve(
        &self,
        key: &str,
        cli: Option<ConfigValue>,
        command: Option<&str>,
    ) -> Result<ConfigValue> {
        if let Some(value) = cli
            && !value.is_unset()
        {
            return Ok(value);
        }

        let leaf = key.rsplit('.').next().unwrap_or(key);
        let is_bare = !key.contains('.');
        let is_global = is_bare || key.starts_with("global.");

        if let Some(command) = command
            && let Some(value) = self.effective_at(&format!("commands.{}.{}", command, leaf))
        {
            return Ok(value.clone());
        }

        let stored = if is_global {
            self.effective_at(&format!("global.{}", leaf))
                .or_else(|| is_bare.then(|| self.effective_at(key)).flatten())
        } else {
            self.effective_at(key)
        };
        if let Some(value) = stored {
            return Ok(value.clone());
        }

        let fallback = if is_bare {
            command
                .and_then(|c| default_for(&format!("commands.{}.{}", c, leaf)))
                .or_else(|| default_for(&format!("global.{}", leaf)))
                .or_else(|| default_for(key))
        } else {
            default_for(key).or_else(|| {
                command.and_then(|c| default_for(&format!("commands.{}.{}", c, leaf)))
            })
        };

        fallback
            .filter(|v| !v.is_unset())
            .ok_or_else(|| AbError::UnknownConfigKey(key.to_string()))
    }

    /// Coerce `raw` and write it at `key`. Returns the stored value.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<ConfigValue> {
        let value = ConfigValue::coerce(raw);
        self.set_value(key, value.clone())?;
        Ok(value)
    }

    /// Write an already-typed value at `key` and persist.
    ///
    /// On any validation failure the in-memory document and the file on
    /// disk are left exactly as they were.
    pub fn set_value(&mut self, key: &str, value: ConfigValue) -> Result<()> {
        let segments: Vec<&str> = key.split('.').collect();
        if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) {
            return Err(AbError::InvalidConfigKey(key.to_string()));
        }
        if !constants::config::SECTIONS.contains(&segments[0]) {
            return Err(AbError::UnknownConfigKey(key.to_string()));
        }

        let mut candidate = self.file.clone();
        candidate.insert_path(key, value)?;
        if segments[0] == "models" {
            check_thresholds(&candidate)?;
        }
        if candidate.lookup("version").is_none() {
            candidate.insert_path(
                "version",
                ConfigValue::from(constants::config::VERSION),
            )?;
        }

        write_atomic(&self.path, &candidate)?;
        tracing::debug!("Wrote {} to {}", key, self.path.display());

        self.effective = merged_with_env(&candidate)?;
        self.file = candidate;
        self.file_exists = true;
        Ok(())
    }

    /// Write the default document to disk.
    ///
    /// Refuses when a file already exists unless `force`; with `force` the
    /// old file is moved to `config.json.bak` first and its path returned.
    pub fn init(&mut self, force: bool) -> Result<Option<PathBuf>> {
        let mut backup = None;
        if self.path.exists() {
            if !force {
                return Err(AbError::Config(format!(
                    "{} already exists. Use --force to overwrite it",
                    self.path.display()
                )));
            }
            let backup_path = backup_path(&self.path);
            fs::rename(&self.path, &backup_path)?;
            tracing::info!("Backed up old configuration to {}", backup_path.display());
            backup = Some(backup_path);
        }

        let document = default_document();
        write_atomic(&self.path, &document)?;

        self.effective = merged_with_env(&document)?;
        self.file = document;
        self.file_exists = true;
        Ok(backup)
    }

    /// Sorted dotted keys of the default schema.
    pub fn list_keys() -> Vec<String> {
        defaults::list_keys()
    }

    /// Effective value of `global.*`-style settings with per-command override.
    pub fn language(&self, command: Option<&str>, cli: Option<&str>) -> String {
        self.resolve("language", cli.map(ConfigValue::from), command)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| defaults::DEFAULT_LANGUAGE.to_string())
    }

    pub fn api_settings(&self) -> ApiSettings {
        let api_base = self
            .string_at("global.api_base")
            .unwrap_or_else(|| defaults::DEFAULT_API_BASE.to_string());
        let api_key_env = self
            .string_at("global.api_key_env")
            .unwrap_or_else(|| defaults::DEFAULT_API_KEY_ENV.to_string());
        let timeout_seconds = self
            .effective_at("global.timeout_seconds")
            .and_then(ConfigValue::as_i64)
            .filter(|n| *n > 0)
            .unwrap_or(defaults::DEFAULT_TIMEOUT_SECONDS) as u64;

        ApiSettings {
            api_base,
            api_key_env,
            timeout_seconds,
        }
    }

    pub fn history_enabled(&self) -> bool {
        self.effective_at("history.enabled")
            .and_then(ConfigValue::as_bool)
            .unwrap_or(true)
    }

    /// History directory with a leading `~` expanded.
    pub fn history_dir(&self) -> PathBuf {
        let raw = self
            .string_at("history.directory")
            .unwrap_or_else(|| defaults::DEFAULT_HISTORY_DIR.to_string());
        expand_home(&raw)
    }

    /// `commands.<command>.<leaf>` as an integer; `cli` wins, then the
    /// command setting, then `global.<leaf>` and defaults.
    pub fn command_int(&self, command: &str, leaf: &str, cli: Option<i64>) -> Option<i64> {
        self.resolve(leaf, cli.map(ConfigValue::Int), Some(command))
            .ok()
            .and_then(|v| v.as_i64())
    }

    pub fn command_bool(&self, command: &str, leaf: &str, cli: Option<bool>) -> Option<bool> {
        self.resolve(leaf, cli.map(ConfigValue::Bool), Some(command))
            .ok()
            .and_then(|v| v.as_bool())
    }

    /// `(small_max_tokens, medium_max_tokens)` from the effective document,
    /// each falling back to its default.
    pub fn thresholds(&self) -> (i64, i64) {
        thresholds_of(&self.effective)
    }

    fn effective_at(&self, key: &str) -> Option<&ConfigValue> {
        self.effective.lookup(key).filter(|v| !v.is_unset())
    }

    fn string_at(&self, key: &str) -> Option<String> {
        self.effective_at(key)
            .and_then(ConfigValue::as_str)
            .map(str::to_string)
    }
}

/// `~/.ab/config.json`
pub fn default_path() -> Result<PathBuf> {
    let dirs = BaseDirs::new()
        .ok_or_else(|| AbError::Config("Cannot determine home directory".to_string()))?;
    Ok(dirs
        .home_dir()
        .join(constants::config::DIR_NAME)
        .join(constants::config::FILE_NAME))
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(constants::config::BACKUP_SUFFIX);
    path.with_file_name(name)
}

fn expand_home(raw: &str) -> PathBuf {
    let rest = match raw.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(raw),
    };
    match BaseDirs::new() {
        Some(dirs) if rest.is_empty() => dirs.home_dir().to_path_buf(),
        Some(dirs) => dirs.home_dir().join(rest),
        None => PathBuf::from(raw),
    }
}

fn read_document(path: &Path) -> Result<(ConfigValue, bool)> {
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok((default_document(), false));
    }

    let content = fs::read_to_string(path)?;
    let json: serde_json::Value =
        serde_json::from_str(&content).map_err(|source| AbError::ConfigCorrupt {
            path: path.to_path_buf(),
            source,
        })?;
    let document = ConfigValue::from(json);

    if document.as_map().is_none() {
        return Err(AbError::Config(format!(
            "{} must contain a JSON object",
            path.display()
        )));
    }

    // 缺失 version 视为 1.0
    if let Some(version) = document.lookup("version")
        && version.as_str() != Some(constants::config::VERSION)
    {
        return Err(AbError::UnsupportedConfigVersion {
            path: path.to_path_buf(),
            version: version.to_string(),
        });
    }

    Ok((document, true))
}

fn merged_with_env(file: &ConfigValue) -> Result<ConfigValue> {
    let mut effective = file.clone();
    effective.merge(&environment_layer()?);
    Ok(effective)
}

fn thresholds_of(document: &ConfigValue) -> (i64, i64) {
    let small = document
        .lookup(SMALL_THRESHOLD_KEY)
        .and_then(ConfigValue::as_i64)
        .unwrap_or(defaults::DEFAULT_SMALL_MAX_TOKENS);
    let medium = document
        .lookup(MEDIUM_THRESHOLD_KEY)
        .and_then(ConfigValue::as_i64)
        .unwrap_or(defaults::DEFAULT_MEDIUM_MAX_TOKENS);
    (small, medium)
}

/// `models.thresholds` must stay a map of integers with `small < medium`.
fn check_thresholds(document: &ConfigValue) -> Result<()> {
    match document.lookup(THRESHOLDS_KEY) {
        None | Some(ConfigValue::Map(_)) => {}
        Some(other) => {
            return Err(AbError::Config(format!(
                "{} must be an object, got '{}'",
                THRESHOLDS_KEY, other
            )));
        }
    }
    for key in [SMALL_THRESHOLD_KEY, MEDIUM_THRESHOLD_KEY] {
        match document.lookup(key) {
            None | Some(ConfigValue::Int(_)) => {}
            Some(other) => {
                return Err(AbError::Config(format!(
                    "{} must be an integer, got '{}'",
                    key, other
                )));
            }
        }
    }

    let (small, medium) = thresholds_of(document);
    if small >= medium {
        return Err(AbError::ThresholdInvariantViolation { small, medium });
    }
    Ok(())
}

fn write_atomic(path: &Path, document: &ConfigValue) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let json = serde_json::to_string_pretty(document)?;
    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(json.as_bytes())?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
