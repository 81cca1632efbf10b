//! # ab-cli
//!
//! 把本地 git 信息和文件内容喂给 LLM（OpenRouter），再把回答落到仓库里。
//!
//! ## 功能
//! - **prompt**：把文件/目录拼成上下文，按 token 估算自动选模型
//! - **git**：commit message、分支名、PR 描述、changelog、冲突解决、历史改写
//! - **util**：解释文件/报错/概念、生成脚本、生成密码
//! - **models**：浏览 OpenRouter 模型目录
//!
//! ## 作为库使用
//! ```no_run
//! use ab_cli::config::{ConfigStore, estimate_tokens, pick};
//!
//! # fn example() -> ab_cli::error::Result<()> {
//! let config = ConfigStore::load()?;
//! let tokens = estimate_tokens("Summarise this repository");
//! let selection = pick(tokens, &config);
//! println!("{} ({})", selection.model_id, selection.tier);
//! # Ok(())
//! # }
//! ```
//!
//! ## 核心模块
//! - [`config`] - `~/.ab/config.json`、环境变量覆盖、模型选择
//! - [`context`] - 文件上下文拼装与 `.aiignore`
//! - [`git`] - Git 操作抽象
//! - [`llm`] - OpenRouter provider 与 prompt 模板
//! - [`history`] - LLM 调用记录
//! - [`commands`] - CLI 命令实现
//! - [`error`] - 统一错误类型
//! - [`ui`] - 终端输出与交互
//!
//! ## 配置
//! 配置文件：`~/.ab/config.json`。任意键都可以用 `AB__<SECTION>__<KEY>`
//! 环境变量临时覆盖，例如 `AB__MODELS__DEFAULT=openai/gpt-4o`。

pub mod cli;
pub mod commands;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod git;
pub mod history;
pub mod llm;
pub mod ui;
