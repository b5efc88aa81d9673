//! Mock implementations of the collaborator traits
//!
//! In-memory test doubles for the message bus, the job executor and the
//! auth client, usable without network access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cronhub_core::{
    errors::causes,
    models::{JobInfo, Visitor},
    traits::{AuthClient, ExecutionReply, JobExecutor, MessageQueue},
    CronError, CronResult,
};
use serde_json::Value;
use tokio::sync::Semaphore;

/// Mock implementation of MessageQueue that records every payload by topic
#[derive(Debug, Clone, Default)]
pub struct MockMessageQueue {
    published: Arc<Mutex<HashMap<String, Vec<Vec<u8>>>>>,
    fail: Arc<AtomicBool>,
    delay: Arc<Mutex<Option<Duration>>>,
}

impl MockMessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后的发布全部失败
    pub fn fail_publishes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// 每次发布前等待
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn messages(&self, topic: &str) -> Vec<Vec<u8>> {
        self.published
            .lock()
            .unwrap()
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    pub fn json_messages(&self, topic: &str) -> Vec<Value> {
        self.messages(topic)
            .iter()
            .map(|payload| serde_json::from_slice(payload).unwrap())
            .collect()
    }

    pub fn count(&self, topic: &str) -> usize {
        self.published
            .lock()
            .unwrap()
            .get(topic)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.published.lock().unwrap().values().map(Vec::len).sum()
    }

    /// 等待主题累计收到 `expected` 条消息
    pub async fn wait_for(&self, topic: &str, expected: usize, timeout: Duration) -> Vec<Value> {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.count(topic) < expected && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.json_messages(topic)
    }
}

#[async_trait]
impl MessageQueue for MockMessageQueue {
    async fn publish_message(&self, queue: &str, payload: &[u8]) -> CronResult<()> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(CronError::internal(causes::MSMQ_UNAVAILABLE));
        }
        self.published
            .lock()
            .unwrap()
            .entry(queue.to_string())
            .or_default()
            .push(payload.to_vec());
        Ok(())
    }
}

/// 执行器替身的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    Complete,
    Accept,
    Fail,
}

/// Mock implementation of JobExecutor
#[derive(Debug, Clone)]
pub struct MockExecutor {
    behavior: Arc<Mutex<MockBehavior>>,
    executed: Arc<Mutex<Vec<JobInfo>>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockExecutor {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            executed: Arc::new(Mutex::new(Vec::new())),
            gate: None,
        }
    }

    /// 执行在调用 [`MockExecutor::release`] 之前一直阻塞
    pub fn gated(behavior: MockBehavior) -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::new(behavior)
        }
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn executed(&self) -> Vec<JobInfo> {
        self.executed.lock().unwrap().clone()
    }

    pub async fn wait_for(&self, expected: usize, timeout: Duration) -> Vec<JobInfo> {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.executed.lock().unwrap().len() < expected
            && tokio::time::Instant::now() < deadline
        {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.executed()
    }
}

#[async_trait]
impl JobExecutor for MockExecutor {
    async fn execute_job(&self, job: &JobInfo) -> CronResult<ExecutionReply> {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        self.executed.lock().unwrap().push(job.clone());
        let behavior = *self.behavior.lock().unwrap();
        match behavior {
            MockBehavior::Complete => Ok(ExecutionReply::Completed),
            MockBehavior::Accept => Ok(ExecutionReply::Accepted),
            MockBehavior::Fail => Err(CronError::internal("connection refused")),
        }
    }
}

/// Mock implementation of AuthClient
#[derive(Debug, Clone, Default)]
pub struct MockAuthClient {
    tokens: Arc<Mutex<HashMap<String, Visitor>>>,
    admin_pair: Option<(String, String)>,
    negotiation_failures: Arc<AtomicUsize>,
    negotiation_attempts: Arc<AtomicUsize>,
}

impl MockAuthClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(self, token: &str, visitor: Visitor) -> Self {
        self.tokens
            .lock()
            .unwrap()
            .insert(token.to_string(), visitor);
        self
    }

    pub fn with_admin(mut self, secret: &str, code: &str) -> Self {
        self.admin_pair = Some((secret.to_string(), code.to_string()));
        self
    }

    /// 前 `failures` 次协商失败
    pub fn failing_negotiation(self, failures: usize) -> Self {
        self.negotiation_failures.store(failures, Ordering::SeqCst);
        self
    }

    pub fn negotiation_attempts(&self) -> usize {
        self.negotiation_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthClient for MockAuthClient {
    fn verify_code(&self, secret: &str, code: &str) -> bool {
        matches!(&self.admin_pair, Some((s, c)) if s == secret && c == code)
    }

    async fn verify_token(&self, token: &str) -> CronResult<Visitor> {
        if token.is_empty() {
            return Err(CronError::unauthorized(causes::TOKEN_EMPTY));
        }
        self.tokens
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or_else(|| CronError::unauthorized(causes::INVALID_TOKEN))
    }

    async fn resolve_introspect_path(&self) -> CronResult<String> {
        let attempt = self.negotiation_attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.negotiation_failures.load(Ordering::SeqCst) {
            return Err(CronError::internal(causes::AUTH_UNAVAILABLE));
        }
        Ok("/admin/oauth2/introspect".to_string())
    }
}
