use std::sync::Arc;

use cronhub_core::{
    causes,
    config::ManagementConfig,
    dictionary::{
        JOB_TYPE_IMMEDIATE, MODE_HTTP, MODE_HTTPS, STATUS_EXECUTING, STATUS_FAILURE,
        STATUS_SUCCESS,
    },
    models::{
        ExecutorRecord, JobContext, JobInfo, JobInfoQueryParams, JobMsg, JobNotify, JobOperation,
        split_ids, JobStatus, JobStatusQueryParams, JobTotal, JobTotalQueryParams, Visitor,
        EXT_RESULT, EXT_TENANT_ID,
    },
    time::now_string,
    traits::{ExecutionReply, JobExecutor, JobRepository},
    CronError, CronResult, ServiceContainer,
};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::publisher::PublisherHandle;

/// 注入HTTP(S)执行请求的回调地址请求头
const WEBHOOK_HEADER: &str = "webhook";

/// 任务管理服务
///
/// 存储写入成功后才提交生命周期消息；消息的发布不阻塞调用方。
#[derive(Clone)]
pub struct ManagementService {
    repository: Arc<dyn JobRepository>,
    executor: Arc<dyn JobExecutor>,
    publisher: PublisherHandle,
    service_id: String,
    webhook_base: String,
    max_execute_times: Option<i64>,
}

impl ManagementService {
    pub fn new(
        container: &ServiceContainer,
        publisher: PublisherHandle,
        config: &ManagementConfig,
    ) -> CronResult<Self> {
        Ok(Self {
            repository: container.job_repository()?,
            executor: container.executor()?,
            publisher,
            service_id: config.resolved_service_id(),
            webhook_base: config.webhook_base.trim_end_matches('/').to_string(),
            max_execute_times: config.max_execute_times,
        })
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn publisher(&self) -> &PublisherHandle {
        &self.publisher
    }

    pub async fn ping(&self) -> CronResult<()> {
        self.repository.ping().await
    }

    /// 创建任务，返回新任务ID
    #[instrument(skip_all, fields(tenant = %visitor.client_id))]
    pub async fn create_job(&self, mut job: JobInfo, visitor: &Visitor) -> CronResult<String> {
        let now = now_string();
        job.job_id = Uuid::new_v4().to_string();
        job.create_time = now.clone();
        job.update_time = now;
        job.tenant_id = visitor.client_id.clone();

        self.repository.create_job(&job, visitor).await?;
        info!("任务已创建: job_id={}, job_name={}", job.job_id, job.job_name);

        let job_id = job.job_id.clone();
        self.publisher
            .publish_lifecycle(JobMsg::new(JobOperation::Create, job));
        Ok(job_id)
    }

    #[instrument(skip_all, fields(job_id = %job_id, tenant = %visitor.client_id))]
    pub async fn update_job(&self, job_id: &str, mut job: JobInfo, visitor: &Visitor) -> CronResult<()> {
        job.job_id = job_id.to_string();
        job.update_time = now_string();
        if job.tenant_id.is_empty() {
            job.tenant_id = visitor.client_id.clone();
        }

        self.repository.update_job(&job, visitor).await?;
        info!("任务已更新: job_id={}", job.job_id);

        self.publisher
            .publish_lifecycle(JobMsg::new(JobOperation::Update, job));
        Ok(())
    }

    /// 删除任务，`job_ids` 为逗号分隔的任务ID
    #[instrument(skip_all, fields(job_ids = %job_ids, tenant = %visitor.client_id))]
    pub async fn delete_jobs(&self, job_ids: &str, visitor: &Visitor) -> CronResult<()> {
        self.repository.delete_jobs(job_ids, visitor).await?;

        for job_id in split_ids(job_ids) {
            let data = JobInfo {
                job_id,
                tenant_id: visitor.client_id.clone(),
                ..Default::default()
            };
            self.publisher
                .publish_lifecycle(JobMsg::new(JobOperation::Delete, data));
        }
        Ok(())
    }

    #[instrument(skip_all, fields(job_ids = %job_ids, enabled = enabled))]
    pub async fn set_enabled(&self, job_ids: &str, enabled: bool, visitor: &Visitor) -> CronResult<()> {
        let ids = split_ids(job_ids);
        let update_time = now_string();
        self.repository
            .batch_set_enabled(&ids, enabled, &update_time, visitor)
            .await?;

        for job_id in ids {
            let data = JobInfo {
                job_id,
                enabled,
                update_time: update_time.clone(),
                ..Default::default()
            };
            self.publisher
                .publish_lifecycle(JobMsg::new(JobOperation::Enable, data));
        }
        Ok(())
    }

    /// 批量修改通知地址，返回修改失败的任务ID
    #[instrument(skip_all, fields(job_ids = %job_ids))]
    pub async fn set_notify(
        &self,
        job_ids: &str,
        notify: JobNotify,
        visitor: &Visitor,
    ) -> CronResult<Vec<String>> {
        let ids = split_ids(job_ids);
        let update_time = now_string();
        let failed = self
            .repository
            .batch_set_notify(&ids, &notify, &update_time, visitor)
            .await?;

        for job_id in ids.into_iter().filter(|id| !failed.contains(id)) {
            let data = JobInfo {
                job_id,
                context: JobContext {
                    notify: notify.clone(),
                    ..Default::default()
                },
                update_time: update_time.clone(),
                ..Default::default()
            };
            self.publisher
                .publish_lifecycle(JobMsg::new(JobOperation::Notify, data));
        }
        Ok(failed)
    }

    pub async fn list_jobs(
        &self,
        params: &JobInfoQueryParams,
        visitor: &Visitor,
    ) -> CronResult<Vec<JobInfo>> {
        self.repository.get_jobs(params, visitor).await
    }

    pub async fn count_jobs(
        &self,
        params: &JobTotalQueryParams,
        visitor: &Visitor,
    ) -> CronResult<JobTotal> {
        self.repository.get_job_total(params, visitor).await
    }

    pub async fn list_status(
        &self,
        params: &JobStatusQueryParams,
        visitor: &Visitor,
    ) -> CronResult<Vec<JobStatus>> {
        self.repository.get_job_status(params, visitor).await
    }

    /// 批量写入执行状态，返回写入失败的执行ID
    pub async fn upsert_status(
        &self,
        statuses: &[JobStatus],
        visitor: &Visitor,
    ) -> CronResult<Vec<String>> {
        self.repository.upsert_job_status(statuses, visitor).await
    }

    /// 立即执行任务
    ///
    /// 先返回执行中状态，执行在后台进行。带执行ID的请求是同一次执行的重试，
    /// 在已存储的执行者记录后追加本实例。
    #[instrument(skip_all, fields(job_id = %job.job_id, execute_id = %job.context.execute_id))]
    pub async fn trigger_execution(&self, mut job: JobInfo, visitor: &Visitor) -> CronResult<JobStatus> {
        if job.job_id.is_empty() {
            return Err(CronError::bad_request_params(
                causes::INVALID_PARAMETER,
                &["job_id"],
            ));
        }
        self.repository.check_execution_mode(&job.context.mode)?;
        if job.tenant_id.is_empty() {
            job.tenant_id = visitor.client_id.clone();
        }

        let now = now_string();
        let record = ExecutorRecord {
            executor_id: self.service_id.clone(),
            executed_at: now.clone(),
        };

        let status = if job.context.execute_id.is_empty() {
            job.context.execute_id = Uuid::new_v4().to_string();
            JobStatus {
                execute_id: job.context.execute_id.clone(),
                job_id: job.job_id.clone(),
                job_type: job.job_type.clone(),
                job_name: job.job_name.clone(),
                status: STATUS_EXECUTING.to_string(),
                begin_time: now,
                executor: vec![record],
                execute_times: 1,
                ..Default::default()
            }
        } else {
            match self
                .repository
                .find_status(&job.context.execute_id, visitor)
                .await?
            {
                Some(mut stored) => {
                    if let Some(cap) = self.max_execute_times {
                        if stored.execute_times >= cap {
                            warn!(
                                "执行次数已达上限: execute_id={}, execute_times={}",
                                stored.execute_id, stored.execute_times
                            );
                            return Err(CronError::too_many_requests(
                                causes::JOB_EXECUTED_TOO_MANY_TIMES,
                            ));
                        }
                    }
                    stored.status = STATUS_EXECUTING.to_string();
                    stored.executor.push(record);
                    stored
                }
                None => JobStatus {
                    execute_id: job.context.execute_id.clone(),
                    job_id: job.job_id.clone(),
                    job_type: job.job_type.clone(),
                    status: STATUS_EXECUTING.to_string(),
                    executor: vec![record],
                    ..Default::default()
                },
            }
        };

        let attempts = status.execute_times.max(1);
        let service = self.clone();
        tokio::spawn(async move {
            service.execute_job(job, attempts).await;
        });

        Ok(status)
    }

    async fn execute_job(&self, mut job: JobInfo, attempts: i64) {
        let execute_id = job.context.execute_id.clone();
        if job.context.mode == MODE_HTTP || job.context.mode == MODE_HTTPS {
            job.context
                .info
                .set_header(WEBHOOK_HEADER, format!("{}/{}", self.webhook_base, execute_id));
        }

        match self.executor.execute_job(&job).await {
            Ok(ExecutionReply::Completed) => {
                info!("任务执行完成: job_id={}, execute_id={}", job.job_id, execute_id);
                self.publisher
                    .publish_status(self.result_status(&job, STATUS_SUCCESS));
            }
            Ok(ExecutionReply::Accepted) => {
                debug!("任务已受理，等待回调: execute_id={}", execute_id);
            }
            Err(e) => {
                warn!(
                    "任务执行失败: job_id={}, execute_id={}, error={}",
                    job.job_id, execute_id, e
                );
                self.publisher
                    .publish_status(self.result_status(&job, STATUS_FAILURE));

                if self.max_execute_times.is_some_and(|cap| attempts >= cap) {
                    warn!("执行次数已达上限，不再重试: execute_id={}", execute_id);
                    return;
                }

                let retry = JobInfo {
                    job_id: job.job_id.clone(),
                    job_type: JOB_TYPE_IMMEDIATE.to_string(),
                    tenant_id: job.tenant_id.clone(),
                    context: JobContext {
                        execute_id,
                        ..Default::default()
                    },
                    ..Default::default()
                };
                self.publisher.publish_immediate(retry);
            }
        }
    }

    fn result_status(&self, job: &JobInfo, status: &str) -> JobStatus {
        let mut ext_info = Map::new();
        if !job.tenant_id.is_empty() {
            ext_info.insert(EXT_TENANT_ID.to_string(), Value::from(job.tenant_id.clone()));
        }
        JobStatus {
            execute_id: job.context.execute_id.clone(),
            job_id: job.job_id.clone(),
            job_type: job.job_type.clone(),
            job_name: job.job_name.clone(),
            status: status.to_string(),
            end_time: now_string(),
            ext_info,
            ..Default::default()
        }
    }

    /// 异步执行完成回调，执行ID为空时忽略
    pub fn handle_webhook(&self, execute_id: &str, result: Value) {
        if execute_id.is_empty() {
            debug!("回调缺少执行ID，忽略");
            return;
        }

        info!("收到执行回调: execute_id={}", execute_id);
        let mut ext_info = Map::new();
        ext_info.insert(EXT_RESULT.to_string(), result);
        self.publisher.publish_status(JobStatus {
            execute_id: execute_id.to_string(),
            status: STATUS_SUCCESS.to_string(),
            end_time: now_string(),
            ext_info,
            ..Default::default()
        });
    }
}
