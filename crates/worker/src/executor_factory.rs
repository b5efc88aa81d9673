use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cronhub_core::{
    config::ExecutorConfig,
    dictionary::{MODE_EXE, MODE_HTTP, MODE_HTTPS},
    errors::causes,
    models::{DispatchProfile, JobInfo},
    traits::{ExecutionReply, JobExecutor},
    CronError, CronResult,
};
use tracing::{debug, info, warn};

use super::executors::{CommandExecutor, ContainerJobExecutor, HttpExecutor};

/// 按执行方式路由的执行器
///
/// 带容器任务描述的任务交给容器执行器，其余按 `mode` 选择。
#[derive(Default)]
pub struct DispatchExecutor {
    routes: HashMap<String, Arc<dyn JobExecutor>>,
    container: Option<Arc<dyn JobExecutor>>,
}

impl DispatchExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, mode: &str, executor: Arc<dyn JobExecutor>) -> Self {
        self.routes.insert(mode.to_string(), executor);
        self
    }

    pub fn with_container(mut self, executor: Arc<dyn JobExecutor>) -> Self {
        self.container = Some(executor);
        self
    }

    pub fn supports(&self, mode: &str) -> bool {
        self.routes.contains_key(mode)
    }

    fn route(&self, job: &JobInfo) -> CronResult<&Arc<dyn JobExecutor>> {
        if let DispatchProfile::ContainerJob(_) = job.context.info.profile {
            return self.container.as_ref().ok_or_else(|| {
                warn!("未配置容器任务执行器: job_id={}", job.job_id);
                CronError::internal(causes::EXECUTOR_UNAVAILABLE)
            });
        }

        self.routes.get(&job.context.mode).ok_or_else(|| {
            CronError::bad_request_params(causes::UNSUPPORTED_EXECUTION_MODE, &["mode"])
        })
    }
}

#[async_trait]
impl JobExecutor for DispatchExecutor {
    async fn execute_job(&self, job: &JobInfo) -> CronResult<ExecutionReply> {
        let executor = self.route(job)?;
        debug!("分发任务: job_id={}, mode={}", job.job_id, job.context.mode);
        executor.execute_job(job).await
    }
}

/// 根据配置构建分发执行器
pub struct ExecutorFactory;

impl ExecutorFactory {
    pub fn from_config(config: &ExecutorConfig) -> CronResult<DispatchExecutor> {
        let http: Arc<dyn JobExecutor> = Arc::new(HttpExecutor::new(config)?);

        let mut dispatch = DispatchExecutor::new()
            .register(MODE_HTTP, Arc::clone(&http))
            .register(MODE_HTTPS, http)
            .register(MODE_EXE, Arc::new(CommandExecutor::new(config)));

        match config.container_runner_url.as_deref() {
            Some(url) if !url.is_empty() => {
                info!("启用容器任务执行器: {}", url);
                dispatch = dispatch.with_container(Arc::new(ContainerJobExecutor::new(url, config)?));
            }
            _ => debug!("未配置容器任务运行端"),
        }

        info!("执行器初始化完成");
        Ok(dispatch)
    }
}
