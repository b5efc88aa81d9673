use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cronhub_core::{
    config::ExecutorConfig,
    errors::causes,
    models::{DispatchProfile, JobInfo},
    traits::{ExecutionReply, JobExecutor},
    CronError, CronResult,
};
use serde::Serialize;
use tokio::process::Command;
use tracing::{error, info, warn};

/// 回调地址请求头
pub const WEBHOOK_HEADER: &str = "webhook";
/// 本地命令可读取的执行ID环境变量
pub const EXECUTE_ID_ENV: &str = "CRONHUB_EXECUTE_ID";

fn build_client(timeout: Duration) -> CronResult<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
        error!("创建HTTP客户端失败: {}", e);
        CronError::internal(causes::EXECUTOR_UNAVAILABLE)
    })
}

/// HTTP(S)任务执行器
///
/// 202 视为已异步受理，其他 2xx 视为同步完成。
pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    pub fn new(config: &ExecutorConfig) -> CronResult<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(config.request_timeout_seconds.max(1)))?,
        })
    }

    fn request_builder(&self, method: &str, url: &str) -> CronResult<reqwest::RequestBuilder> {
        let method = if method.is_empty() {
            "GET".to_string()
        } else {
            method.to_uppercase()
        };

        let builder = match method.as_str() {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url),
            "PUT" => self.client.put(url),
            "DELETE" => self.client.delete(url),
            "PATCH" => self.client.patch(url),
            "HEAD" => self.client.head(url),
            _ => {
                return Err(CronError::bad_request_params(
                    causes::INVALID_PARAMETER,
                    &["method"],
                ));
            }
        };
        Ok(builder)
    }
}

#[async_trait]
impl JobExecutor for HttpExecutor {
    async fn execute_job(&self, job: &JobInfo) -> CronResult<ExecutionReply> {
        let start_time = Instant::now();
        let info = &job.context.info;
        let url = job.context.exec.as_str();

        info!(
            "执行HTTP任务: job_id={}, execute_id={}, method={}, url={}",
            job.job_id, job.context.execute_id, info.method, url
        );

        let mut request = self.request_builder(&info.method, url)?;
        if let Some(params) = &info.params {
            request = request.query(params);
        }
        if let Some(headers) = &info.headers {
            for (key, value) in headers {
                request = request.header(key.as_str(), value.as_str());
            }
        }
        request = match &info.profile {
            DispatchProfile::Raw(body) if body.is_empty() => request,
            DispatchProfile::Raw(body) => request.json(body),
            DispatchProfile::ContainerJob(spec) => request.json(spec),
        };

        let response = request.send().await.map_err(|e| {
            error!("HTTP任务请求失败: job_id={}, error={}", job.job_id, e);
            CronError::internal(causes::EXECUTOR_UNAVAILABLE)
        })?;

        let status = response.status();
        let duration = start_time.elapsed().as_millis();
        if status == reqwest::StatusCode::ACCEPTED {
            info!("HTTP任务已受理: job_id={}, duration={}ms", job.job_id, duration);
            return Ok(ExecutionReply::Accepted);
        }
        if status.is_success() {
            info!("HTTP任务执行完成: job_id={}, duration={}ms", job.job_id, duration);
            return Ok(ExecutionReply::Completed);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(
            "HTTP任务执行失败: job_id={}, status={}, response={}",
            job.job_id, status, body
        );
        Err(CronError::internal(format!(
            "Execution failed with status {}",
            status.as_u16()
        )))
    }
}

/// 本地命令执行器
///
/// `exec` 按空白拆分为程序和参数，`info.params` 作为环境变量传入。退出码为0视为完成。
pub struct CommandExecutor {
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.request_timeout_seconds.max(1)),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl JobExecutor for CommandExecutor {
    async fn execute_job(&self, job: &JobInfo) -> CronResult<ExecutionReply> {
        let mut parts = job.context.exec.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| CronError::bad_request_params(causes::INVALID_PARAMETER, &["exec"]))?;
        let args: Vec<&str> = parts.collect();

        info!(
            "执行本地命令: job_id={}, program={}, args={:?}",
            job.job_id, program, args
        );

        let mut cmd = Command::new(program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .env(EXECUTE_ID_ENV, &job.context.execute_id);
        if let Some(params) = &job.context.info.params {
            cmd.envs(params);
        }

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                error!("启动命令失败: job_id={}, error={}", job.job_id, e);
                return Err(CronError::internal(causes::EXECUTOR_UNAVAILABLE));
            }
            Err(_) => {
                warn!("命令执行超时: job_id={}, timeout={:?}", job.job_id, self.timeout);
                return Err(CronError::internal("Execution timed out"));
            }
        };

        if output.status.success() {
            info!("本地命令执行完成: job_id={}", job.job_id);
            return Ok(ExecutionReply::Completed);
        }

        warn!(
            "本地命令执行失败: job_id={}, exit_code={:?}, stderr={}",
            job.job_id,
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim_end()
        );
        Err(CronError::internal(format!(
            "Execution failed with exit code {}",
            output.status.code().unwrap_or(-1)
        )))
    }
}

#[derive(Serialize)]
struct ContainerJobRequest<'a> {
    job_id: &'a str,
    job_name: &'a str,
    execute_id: &'a str,
    webhook: Option<&'a str>,
    spec: &'a cronhub_core::models::ContainerJobSpec,
}

/// 容器任务执行器
///
/// 把任务描述提交给容器任务运行端，提交成功即视为已受理，完成结果经webhook回调。
pub struct ContainerJobExecutor {
    client: reqwest::Client,
    runner_url: String,
}

impl ContainerJobExecutor {
    pub fn new(runner_url: impl Into<String>, config: &ExecutorConfig) -> CronResult<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(config.request_timeout_seconds.max(1)))?,
            runner_url: runner_url.into(),
        })
    }
}

#[async_trait]
impl JobExecutor for ContainerJobExecutor {
    async fn execute_job(&self, job: &JobInfo) -> CronResult<ExecutionReply> {
        let DispatchProfile::ContainerJob(spec) = &job.context.info.profile else {
            return Err(CronError::bad_request_params(
                causes::INVALID_PARAMETER,
                &["kubernetes"],
            ));
        };

        let webhook = job
            .context
            .info
            .headers
            .as_ref()
            .and_then(|headers| headers.get(WEBHOOK_HEADER))
            .map(String::as_str);

        let payload = ContainerJobRequest {
            job_id: &job.job_id,
            job_name: &job.job_name,
            execute_id: &job.context.execute_id,
            webhook,
            spec,
        };

        info!(
            "提交容器任务: job_id={}, image={}, runner={}",
            job.job_id, spec.image, self.runner_url
        );

        let response = self
            .client
            .post(&self.runner_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!("提交容器任务失败: job_id={}, error={}", job.job_id, e);
                CronError::internal(causes::EXECUTOR_UNAVAILABLE)
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(ExecutionReply::Accepted);
        }

        warn!("容器任务被拒绝: job_id={}, status={}", job.job_id, status);
        Err(CronError::internal(format!(
            "Execution failed with status {}",
            status.as_u16()
        )))
    }
}
