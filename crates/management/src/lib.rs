//! 任务管理编排
//!
//! 任务增删改、立即执行、失败重试、webhook完成回调，以及把生命周期消息异步投递到消息总线的发布器。

pub mod publisher;
pub mod service;
pub mod startup;

pub use publisher::{LifecyclePublisher, PublisherHandle, PublisherStats, StatsSnapshot};
pub use service::ManagementService;
pub use startup::wait_for_auth;
