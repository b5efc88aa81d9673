pub mod executions;
pub mod health;
pub mod jobs;
pub mod status;

use serde::Serialize;

/// 批量操作中失败的ID
#[derive(Debug, Serialize)]
pub struct FailedJobs {
    pub failed_job_id: Vec<String>,
}
