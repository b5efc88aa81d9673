//! Test data builders for creating test entities

use cronhub_core::{
    dictionary::{JOB_TYPE_PERIODIC, MODE_HTTP, STATUS_EXECUTING},
    models::{ExecutorRecord, JobInfo, JobStatus, EXT_TENANT_ID},
    time::now_string,
};
use serde_json::Value;
use uuid::Uuid;

/// Builder for creating test JobInfo entities
pub struct JobInfoBuilder {
    job: JobInfo,
}

impl JobInfoBuilder {
    pub fn new() -> Self {
        let now = now_string();
        let mut job = JobInfo {
            job_id: Uuid::new_v4().to_string(),
            job_name: "nightly-report".to_string(),
            cron_time: "0 */5 * * * *".to_string(),
            job_type: JOB_TYPE_PERIODIC.to_string(),
            tenant_id: "tenant-a".to_string(),
            enabled: true,
            create_time: now.clone(),
            update_time: now,
            ..Default::default()
        };
        job.context.mode = MODE_HTTP.to_string();
        job.context.exec = "http://127.0.0.1:9/run".to_string();
        job.context.info.method = "GET".to_string();
        Self { job }
    }

    pub fn with_id(mut self, job_id: &str) -> Self {
        self.job.job_id = job_id.to_string();
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.job.job_name = name.to_string();
        self
    }

    pub fn with_cron(mut self, cron_time: &str) -> Self {
        self.job.cron_time = cron_time.to_string();
        self
    }

    pub fn with_type(mut self, job_type: &str) -> Self {
        self.job.job_type = job_type.to_string();
        self
    }

    pub fn with_mode(mut self, mode: &str) -> Self {
        self.job.context.mode = mode.to_string();
        self
    }

    pub fn with_exec(mut self, exec: &str) -> Self {
        self.job.context.exec = exec.to_string();
        self
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.job.context.info.method = method.to_string();
        self
    }

    pub fn with_tenant(mut self, tenant_id: &str) -> Self {
        self.job.tenant_id = tenant_id.to_string();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.job.enabled = enabled;
        self
    }

    pub fn with_remarks(mut self, remarks: &str) -> Self {
        self.job.remarks = remarks.to_string();
        self
    }

    pub fn with_window(mut self, begin_at: &str, end_at: &str) -> Self {
        self.job.context.begin_time = begin_at.to_string();
        self.job.context.end_time = end_at.to_string();
        self
    }

    pub fn with_created_at(mut self, created_at: &str) -> Self {
        self.job.create_time = created_at.to_string();
        self
    }

    pub fn with_execute_id(mut self, execute_id: &str) -> Self {
        self.job.context.execute_id = execute_id.to_string();
        self
    }

    pub fn build(self) -> JobInfo {
        self.job
    }
}

impl Default for JobInfoBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test JobStatus entities
pub struct JobStatusBuilder {
    status: JobStatus,
}

impl JobStatusBuilder {
    pub fn new(execute_id: &str, job_id: &str) -> Self {
        let mut status = JobStatus {
            execute_id: execute_id.to_string(),
            job_id: job_id.to_string(),
            job_type: JOB_TYPE_PERIODIC.to_string(),
            job_name: "nightly-report".to_string(),
            status: STATUS_EXECUTING.to_string(),
            begin_time: now_string(),
            execute_times: 1,
            ..Default::default()
        };
        status
            .ext_info
            .insert(EXT_TENANT_ID.to_string(), Value::from("tenant-a"));
        Self { status }
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status.status = status.to_string();
        self
    }

    pub fn with_type(mut self, job_type: &str) -> Self {
        self.status.job_type = job_type.to_string();
        self
    }

    pub fn with_tenant(mut self, tenant_id: &str) -> Self {
        self.status
            .ext_info
            .insert(EXT_TENANT_ID.to_string(), Value::from(tenant_id));
        self
    }

    pub fn without_tenant(mut self) -> Self {
        self.status.ext_info.remove(EXT_TENANT_ID);
        self
    }

    pub fn with_begin_time(mut self, begin_at: &str) -> Self {
        self.status.begin_time = begin_at.to_string();
        self
    }

    pub fn with_end_time(mut self, end_at: &str) -> Self {
        self.status.end_time = end_at.to_string();
        self
    }

    pub fn with_execute_times(mut self, execute_times: i64) -> Self {
        self.status.execute_times = execute_times;
        self
    }

    pub fn with_executor(mut self, executor_id: &str, executed_at: &str) -> Self {
        self.status.executor.push(ExecutorRecord {
            executor_id: executor_id.to_string(),
            executed_at: executed_at.to_string(),
        });
        self
    }

    pub fn with_ext(mut self, key: &str, value: Value) -> Self {
        self.status.ext_info.insert(key.to_string(), value);
        self
    }

    pub fn build(self) -> JobStatus {
        self.status
    }
}
