use async_trait::async_trait;

use crate::{models::JobInfo, CronResult};

/// 执行结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionReply {
    /// 同步执行完成
    Completed,
    /// 已异步受理，完成结果经webhook回调
    Accepted,
}

/// 任务执行器
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute_job(&self, job: &JobInfo) -> CronResult<ExecutionReply>;
}
