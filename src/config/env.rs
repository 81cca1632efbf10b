// 环境变量配置层
//
// AB__GLOBAL__LANGUAGE=pt-br -> global.language
// 只影响有效配置，`set` 写回磁盘时不会带上这一层。

use config::{Config, Environment};

use super::value::ConfigValue;
use crate::constants;
use crate::error::Result;

/// 从 `AB__*` 环境变量构建覆盖层
///
/// 没有匹配的环境变量时返回空 map。
pub fn environment_layer() -> Result<ConfigValue> {
    let settings = Config::builder()
        .add_source(
            Environment::with_prefix(constants::config::ENV_PREFIX)
                .separator(constants::config::ENV_SEPARATOR)
                .try_parsing(true),
        )
        .build()?;

    let raw: serde_json::Value = settings.try_deserialize()?;
    let layer = ConfigValue::from(raw);

    if !layer.leaf_paths().is_empty() {
        tracing::debug!("Environment overrides: {:?}", layer.leaf_paths());
    }

    Ok(layer)
}
