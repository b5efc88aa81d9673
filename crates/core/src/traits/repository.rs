use async_trait::async_trait;

use crate::{
    models::{
        JobInfo, JobInfoQueryParams, JobNotify, JobStatus, JobStatusQueryParams, JobTotal,
        JobTotalQueryParams, Visitor,
    },
    CronResult,
};

/// 任务存储
///
/// 除管理员外，所有读写都限定在访问者自己的租户内。
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create_job(&self, job: &JobInfo, visitor: &Visitor) -> CronResult<()>;

    async fn update_job(&self, job: &JobInfo, visitor: &Visitor) -> CronResult<()>;

    /// 删除任务，`job_ids` 为逗号分隔的任务ID
    async fn delete_jobs(&self, job_ids: &str, visitor: &Visitor) -> CronResult<()>;

    async fn get_jobs(
        &self,
        params: &JobInfoQueryParams,
        visitor: &Visitor,
    ) -> CronResult<Vec<JobInfo>>;

    async fn get_job_total(
        &self,
        params: &JobTotalQueryParams,
        visitor: &Visitor,
    ) -> CronResult<JobTotal>;

    async fn get_job_status(
        &self,
        params: &JobStatusQueryParams,
        visitor: &Visitor,
    ) -> CronResult<Vec<JobStatus>>;

    /// 按执行ID查找执行状态
    async fn find_status(&self, execute_id: &str, visitor: &Visitor)
        -> CronResult<Option<JobStatus>>;

    /// 批量写入执行状态，返回写入失败的执行ID
    async fn upsert_job_status(
        &self,
        statuses: &[JobStatus],
        visitor: &Visitor,
    ) -> CronResult<Vec<String>>;

    async fn batch_set_enabled(
        &self,
        job_ids: &[String],
        enabled: bool,
        update_time: &str,
        visitor: &Visitor,
    ) -> CronResult<()>;

    /// 批量修改通知地址，返回修改失败的任务ID
    async fn batch_set_notify(
        &self,
        job_ids: &[String],
        notify: &JobNotify,
        update_time: &str,
        visitor: &Visitor,
    ) -> CronResult<Vec<String>>;

    fn check_execution_mode(&self, mode: &str) -> CronResult<()>;

    async fn ping(&self) -> CronResult<()>;
}
