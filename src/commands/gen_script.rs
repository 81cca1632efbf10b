use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use std::sync::LazyLock;

use colored::Colorize;
use regex::Regex;

use super::options::GenScriptOptions;
use super::{LlmCall, ask};
use crate::config::ConfigStore;
use crate::context::directory_listing;
use crate::error::{AbError, Result};
use crate::llm::LlmProvider;
use crate::llm::prompt::{ScriptInput, ScriptMode, gen_script_prompt};
use crate::llm::provider::create_provider;
use crate::llm::provider::utils::strip_code_fences;
use crate::ui;

const COMMAND: &str = "gen-script";

/// Directory listings are cut to this many characters.
const LISTING_MAX_CHARS: usize = 1500;

/// Tools reported as available when found on PATH.
const PROBED_TOOLS: &[&str] = &["curl", "wget", "jq", "git", "docker", "kubectl"];

static PERL_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"v(\d+\.\d+\.\d+)").expect("valid regex"));

/// 目标脚本语言
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptLanguage {
    Bash,
    Sh,
    Python,
    Perl,
    Ruby,
    Node,
}

impl ScriptLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Sh => "sh",
            Self::Python => "python3",
            Self::Perl => "perl",
            Self::Ruby => "ruby",
            Self::Node => "node",
        }
    }

    pub fn shebang(&self) -> &'static str {
        match self {
            Self::Bash => "#!/usr/bin/env bash",
            Self::Sh => "#!/bin/sh",
            Self::Python => "#!/usr/bin/env python3",
            Self::Perl => "#!/usr/bin/env perl",
            Self::Ruby => "#!/usr/bin/env ruby",
            Self::Node => "#!/usr/bin/env node",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Bash | Self::Sh => "sh",
            Self::Python => "py",
            Self::Perl => "pl",
            Self::Ruby => "rb",
            Self::Node => "js",
        }
    }

    /// Program used by `--run`.
    pub fn interpreter(&self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Sh => "sh",
            Self::Python => "python3",
            Self::Perl => "perl",
            Self::Ruby => "ruby",
            Self::Node => "node",
        }
    }
}

impl FromStr for ScriptLanguage {
    type Err = AbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "bash" => Ok(Self::Bash),
            "sh" => Ok(Self::Sh),
            "python" | "python3" => Ok(Self::Python),
            "perl" => Ok(Self::Perl),
            "ruby" => Ok(Self::Ruby),
            "node" => Ok(Self::Node),
            other => Err(AbError::InvalidInput(format!(
                "Unsupported script language '{}' (expected bash, sh, python, python3, perl, ruby or node)",
                other
            ))),
        }
    }
}

/// `ab util gen-script`
pub async fn run(options: &GenScriptOptions, config: &ConfigStore, colored: bool) -> Result<()> {
    let provider = create_provider(config)?;
    run_internal(options, config, provider.as_ref(), colored)
        .await
        .map(|_| ())
}

pub async fn run_internal(
    options: &GenScriptOptions,
    config: &ConfigStore,
    llm: &dyn LlmProvider,
    colored: bool,
) -> Result<Option<PathBuf>> {
    let description = options.description.trim();
    if description.is_empty() {
        return Err(AbError::InvalidInput(
            "Describe what the script should do".to_string(),
        ));
    }
    let script_lang: ScriptLanguage = options.script_language.parse()?;
    // 保存到文件时总是生成完整脚本
    let mode = if options.output.is_some() {
        ScriptMode::Full
    } else {
        options.mode
    };
    let is_script = mode != ScriptMode::Oneshot;

    ui::info("Gathering system context...", colored);
    let system = system_context();
    let listing: String = directory_listing(Path::new("."))
        .chars()
        .take(LISTING_MAX_CHARS)
        .collect();

    ui::info(
        &format!(
            "Generating {} {}...",
            script_lang.as_str(),
            if is_script { "script" } else { "one-liner" }
        ),
        colored,
    );
    let language = config.language(Some(COMMAND), options.language.as_deref());
    let prompt = gen_script_prompt(&ScriptInput {
        description,
        language: script_lang.as_str(),
        system_context: &system,
        directory_listing: &listing,
        mode,
    });
    let completion = ask(
        llm,
        config,
        LlmCall::new(COMMAND, prompt, language).with_spinner("Waiting for the model..."),
    )
    .await?;

    let mut script = strip_code_fences(&completion.text);
    if script.is_empty() {
        return Err(AbError::Llm("Failed to generate script".to_string()));
    }
    if is_script && !script.starts_with("#!") {
        script = format!("{}\n\n{}", script_lang.shebang(), script);
    }

    print_script(&script, is_script, colored);

    let saved = match &options.output {
        Some(path) => {
            let path = save_script(path, &script, script_lang)?;
            ui::success(&format!("Script saved to: {}", path.display()), colored);
            Some(path)
        }
        None => None,
    };

    if options.run {
        run_script(&script, script_lang, colored)?;
    }
    Ok(saved)
}

fn print_script(script: &str, is_script: bool, colored: bool) {
    let (title, rule) = if is_script {
        ("=== GENERATED SCRIPT ===", "========================")
    } else {
        ("=== COMMAND ===", "===============")
    };
    println!();
    if colored {
        println!("{}", title.green());
        println!("{}", script);
        println!("{}", rule.green());
    } else {
        println!("{}", title);
        println!("{}", script);
        println!("{}", rule);
    }
    println!();
}

/// Write with a trailing newline, add the language extension when the path
/// has none, and mark the file executable.
pub fn save_script(path: &Path, script: &str, lang: ScriptLanguage) -> Result<PathBuf> {
    let path = if path.extension().is_none() {
        path.with_extension(lang.extension())
    } else {
        path.to_path_buf()
    };
    fs::write(&path, format!("{}\n", script))?;
    make_executable(&path)?;
    Ok(path)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o111);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

fn run_script(script: &str, lang: ScriptLanguage, colored: bool) -> Result<()> {
    ui::info("Executing script...", colored);
    println!();

    let file = tempfile::Builder::new()
        .prefix("ab-script-")
        .suffix(&format!(".{}", lang.extension()))
        .tempfile()?;
    fs::write(file.path(), format!("{}\n", script))?;

    let status = Command::new(lang.interpreter())
        .arg(file.path())
        .status()
        .map_err(|e| AbError::Other(format!("Failed to run {}: {}", lang.interpreter(), e)))?;
    if !status.success() {
        let code = status
            .code()
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        ui::warning(&format!("Script exited with code: {}", code), colored);
    }
    Ok(())
}

/// OS, user, shell, interpreter versions and tools on PATH.
pub fn system_context() -> String {
    let os = command_output("uname", &["-srm"]).unwrap_or_else(|| "unknown".into());
    let mut parts = vec![format!("OS: {}", os)];

    if let Some(distro) = distro_name() {
        parts.push(format!("Distro: {}", distro));
    }

    let user = std::env::var("USER")
        .ok()
        .or_else(|| command_output("whoami", &[]))
        .unwrap_or_else(|| "unknown".into());
    parts.push(format!("User: {}", user));

    if let Ok(cwd) = std::env::current_dir() {
        parts.push(format!("Current directory: {}", cwd.display()));
    }
    parts.push(format!(
        "Shell: {}",
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".into())
    ));

    let bash = command_output("bash", &["--version"])
        .and_then(|v| v.lines().next().map(str::to_string))
        .unwrap_or_else(|| "not installed".into());
    parts.push(format!("Bash: {}", bash));
    parts.push(format!(
        "Python: {}",
        command_output("python3", &["--version"]).unwrap_or_else(|| "not installed".into())
    ));
    parts.push(format!(
        "Node.js: {}",
        command_output("node", &["--version"]).unwrap_or_else(|| "not installed".into())
    ));
    let ruby = command_output("ruby", &["--version"])
        .map(|v| v.split_whitespace().take(2).collect::<Vec<_>>().join(" "))
        .unwrap_or_else(|| "not installed".into());
    parts.push(format!("Ruby: {}", ruby));
    let perl = match command_output("perl", &["-v"]) {
        Some(out) => PERL_VERSION
            .find(&out)
            .map_or_else(|| "installed".to_string(), |m| format!("perl {}", m.as_str())),
        None => "not installed".to_string(),
    };
    parts.push(format!("Perl: {}", perl));

    let tools: Vec<&str> = PROBED_TOOLS
        .iter()
        .copied()
        .filter(|tool| which::which(tool).is_ok())
        .collect();
    if !tools.is_empty() {
        parts.push(format!("Available tools: {}", tools.join(", ")));
    }

    parts.join("\n")
}

fn distro_name() -> Option<String> {
    let release = fs::read_to_string("/etc/os-release").ok()?;
    release
        .lines()
        .find_map(|line| line.strip_prefix("PRETTY_NAME="))
        .map(|value| value.trim().trim_matches('"').to_string())
}

/// Trimmed stdout of a successful run.
fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::test_utils::test_config;
    use crate::llm::{Completion, MockLlmProvider};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_script_language_parse() {
        assert_eq!("python".parse::<ScriptLanguage>().unwrap(), ScriptLanguage::Python);
        assert_eq!("PYTHON3".parse::<ScriptLanguage>().unwrap(), ScriptLanguage::Python);
        assert_eq!(ScriptLanguage::Node.extension(), "js");
        assert_eq!(ScriptLanguage::Sh.shebang(), "#!/bin/sh");
        assert!("cobol".parse::<ScriptLanguage>().is_err());
    }

    #[test]
    fn test_save_script_adds_extension_and_exec_bit() {
        let dir = TempDir::new().unwrap();
        let saved =
            save_script(&dir.path().join("backup"), "echo hi", ScriptLanguage::Bash).unwrap();
        assert_eq!(saved, dir.path().join("backup.sh"));
        assert_eq!(fs::read_to_string(&saved).unwrap(), "echo hi\n");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&saved).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }

        let kept =
            save_script(&dir.path().join("job.py"), "print(1)", ScriptLanguage::Bash).unwrap();
        assert_eq!(kept, dir.path().join("job.py"));
    }

    #[test]
    fn test_system_context_has_core_lines() {
        let context = system_context();
        assert!(context.starts_with("OS: "));
        assert!(context.contains("\nUser: "));
        assert!(context.contains("\nPython: "));
    }

    #[tokio::test]
    async fn test_output_forces_full_script_with_shebang() {
        let dir = TempDir::new().unwrap();
        let config = test_config("http://127.0.0.1:9", "AB_UNUSED_KEY");
        let mut llm = MockLlmProvider::new();
        llm.expect_complete()
            .withf(|req| req.prompt.contains("production-ready python3 script"))
            .times(1)
            .returning(|_| {
                Ok(Completion {
                    text: "```python\nprint('backup')\n```".into(),
                    ..Default::default()
                })
            });

        let options = GenScriptOptions {
            description: "back up the database".into(),
            script_language: "python".into(),
            output: Some(dir.path().join("backup")),
            ..Default::default()
        };
        let saved = run_internal(&options, &config, &llm, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved, dir.path().join("backup.py"));
        assert_eq!(
            fs::read_to_string(saved).unwrap(),
            "#!/usr/bin/env python3\n\nprint('backup')\n"
        );
    }

    #[tokio::test]
    async fn test_oneshot_has_no_shebang() {
        let config = test_config("http://127.0.0.1:9", "AB_UNUSED_KEY");
        let mut llm = MockLlmProvider::new();
        llm.expect_complete().returning(|_| {
            Ok(Completion {
                text: "du -sh *".into(),
                ..Default::default()
            })
        });

        let options = GenScriptOptions {
            description: "show disk usage".into(),
            script_language: "bash".into(),
            ..Default::default()
        };
        assert!(run_internal(&options, &config, &llm, false).await.unwrap().is_none());
    }
}
