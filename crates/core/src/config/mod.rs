//! 配置管理
//!
//! 配置按以下顺序加载：
//! 1. 内置默认值
//! 2. TOML配置文件
//! 3. 环境变量覆盖（前缀 `CRONHUB`，层级分隔符 `__`，例如 `CRONHUB_DATABASE__URL`）

pub mod app_config;

pub use app_config::*;
