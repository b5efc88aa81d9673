//! # CronHub Testing Utils
//!
//! 各crate测试共用的内存替身与测试数据构建器。
//!
//! ```toml
//! [dev-dependencies]
//! cronhub-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod mocks;

pub use builders::*;
pub use mocks::*;
