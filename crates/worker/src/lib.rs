//! 任务执行器
//!
//! HTTP(S)调用、本地命令、容器任务提交三种执行方式，以及按执行方式路由的分发执行器。

pub mod executor_factory;
pub mod executors;

pub use executor_factory::{DispatchExecutor, ExecutorFactory};
pub use executors::{CommandExecutor, ContainerJobExecutor, HttpExecutor};
