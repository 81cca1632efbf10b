//! User configuration and model selection
//!
//! 配置优先级（从高到低）：
//! 1. 命令行参数
//! 2. `commands.<command>.*`
//! 3. `global.*`（或 key 自身路径）
//!
//! 第 2、3 步读取的是有效文档：`~/.ab/config.json` 叠加 `AB__*` 环境变量；
//! 都没有时回落到内置默认值。

pub mod defaults;
pub mod env;
pub mod models;
pub mod store;
pub mod value;

pub use models::{ModelSelection, Tier, estimate_tokens, pick};
pub use store::{ApiSettings, ConfigStore, default_path};
pub use value::ConfigValue;
