//! # cronhub core
//!
//! 多租户定时任务管理服务的核心定义：错误类型、数据模型、枚举字典、配置、日志，
//! 以及存储、消息总线、执行器、授权客户端等协作方的抽象接口。

pub mod config;
pub mod container;
pub mod dictionary;
pub mod errors;
pub mod logging;
pub mod models;
pub mod time;
pub mod traits;

pub use container::ServiceContainer;
pub use dictionary::EnumDictionary;
pub use errors::{causes, CronError, CronResult, ErrorDetail, ErrorKind};
