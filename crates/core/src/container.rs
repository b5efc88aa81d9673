use std::sync::Arc;

use crate::{
    dictionary::EnumDictionary,
    traits::{AuthClient, JobExecutor, JobRepository, MessageQueue},
    CronError, CronResult,
};

/// 服务容器
///
/// 进程启动时构建一次，之后只读，各组件通过构造函数取得依赖。
pub struct ServiceContainer {
    dictionary: Arc<EnumDictionary>,
    job_repository: Option<Arc<dyn JobRepository>>,
    message_queue: Option<Arc<dyn MessageQueue>>,
    executor: Option<Arc<dyn JobExecutor>>,
    auth_client: Option<Arc<dyn AuthClient>>,
}

impl ServiceContainer {
    pub fn new(dictionary: Arc<EnumDictionary>) -> Self {
        Self {
            dictionary,
            job_repository: None,
            message_queue: None,
            executor: None,
            auth_client: None,
        }
    }

    pub fn register_job_repository(&mut self, service: Arc<dyn JobRepository>) {
        self.job_repository = Some(service);
    }

    pub fn register_message_queue(&mut self, service: Arc<dyn MessageQueue>) {
        self.message_queue = Some(service);
    }

    pub fn register_executor(&mut self, service: Arc<dyn JobExecutor>) {
        self.executor = Some(service);
    }

    pub fn register_auth_client(&mut self, service: Arc<dyn AuthClient>) {
        self.auth_client = Some(service);
    }

    pub fn dictionary(&self) -> Arc<EnumDictionary> {
        Arc::clone(&self.dictionary)
    }

    pub fn job_repository(&self) -> CronResult<Arc<dyn JobRepository>> {
        self.job_repository
            .clone()
            .ok_or_else(|| CronError::internal(crate::errors::causes::DATABASE_UNAVAILABLE))
    }

    pub fn message_queue(&self) -> CronResult<Arc<dyn MessageQueue>> {
        self.message_queue
            .clone()
            .ok_or_else(|| CronError::internal(crate::errors::causes::MSMQ_UNAVAILABLE))
    }

    pub fn executor(&self) -> CronResult<Arc<dyn JobExecutor>> {
        self.executor
            .clone()
            .ok_or_else(|| CronError::internal(crate::errors::causes::EXECUTOR_UNAVAILABLE))
    }

    pub fn auth_client(&self) -> CronResult<Arc<dyn AuthClient>> {
        self.auth_client
            .clone()
            .ok_or_else(|| CronError::internal(crate::errors::causes::AUTH_UNAVAILABLE))
    }
}

impl Default for ServiceContainer {
    fn default() -> Self {
        Self::new(EnumDictionary::shared())
    }
}
