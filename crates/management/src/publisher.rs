use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cronhub_core::{
    config::{ManagementConfig, MessageQueueConfig},
    models::{JobInfo, JobMsg, JobStatus},
    traits::MessageQueue,
};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::SendTimeoutError};
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Submitted,
    Published,
    Failed,
    Dropped,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Submitted => "submitted",
            Outcome::Published => "published",
            Outcome::Failed => "failed",
            Outcome::Dropped => "dropped",
        }
    }
}

/// 发布计数
#[derive(Debug, Default)]
pub struct PublisherStats {
    submitted: AtomicU64,
    published: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// 发布计数快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub published: u64,
    pub failed: u64,
    pub dropped: u64,
}

impl PublisherStats {
    fn record(&self, topic: &str, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Submitted => &self.submitted,
            Outcome::Published => &self.published,
            Outcome::Failed => &self.failed,
            Outcome::Dropped => &self.dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(
            "cronhub_lifecycle_messages_total",
            "topic" => topic.to_string(),
            "outcome" => outcome.as_str()
        )
        .increment(1);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
struct Topics {
    lifecycle: String,
    immediate: String,
    status: String,
}

/// 发布器的提交端
///
/// 提交在独立任务中进行，调用方从不等待；通道已满时最多等待 `submit_timeout`，超时丢弃。
#[derive(Debug, Clone)]
pub struct PublisherHandle {
    lifecycle_tx: mpsc::Sender<JobMsg>,
    immediate_tx: mpsc::Sender<JobInfo>,
    status_tx: mpsc::Sender<JobStatus>,
    topics: Arc<Topics>,
    submit_timeout: Duration,
    stats: Arc<PublisherStats>,
}

impl PublisherHandle {
    /// 任务生命周期消息
    pub fn publish_lifecycle(&self, msg: JobMsg) {
        debug!("提交生命周期消息: method={}, job_id={}", msg.method, msg.data.job_id);
        self.submit(self.lifecycle_tx.clone(), msg, &self.topics.lifecycle);
    }

    /// 立即执行的重试任务
    pub fn publish_immediate(&self, job: JobInfo) {
        debug!(
            "提交重试任务: job_id={}, execute_id={}",
            job.job_id, job.context.execute_id
        );
        self.submit(self.immediate_tx.clone(), job, &self.topics.immediate);
    }

    /// 执行状态
    pub fn publish_status(&self, status: JobStatus) {
        debug!(
            "提交执行状态: execute_id={}, status={}",
            status.execute_id, status.status
        );
        self.submit(self.status_tx.clone(), status, &self.topics.status);
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn submit<T: Send + 'static>(&self, tx: mpsc::Sender<T>, item: T, topic: &str) {
        self.stats.record(topic, Outcome::Submitted);

        let stats = Arc::clone(&self.stats);
        let timeout = self.submit_timeout;
        let topic = topic.to_string();
        tokio::spawn(async move {
            match tx.send_timeout(item, timeout).await {
                Ok(()) => {}
                Err(SendTimeoutError::Timeout(_)) => {
                    warn!("发布通道已满，消息被丢弃: topic={}, 等待 {:?}", topic, timeout);
                    stats.record(&topic, Outcome::Dropped);
                }
                Err(SendTimeoutError::Closed(_)) => {
                    warn!("发布器已停止，消息被丢弃: topic={}", topic);
                    stats.record(&topic, Outcome::Dropped);
                }
            }
        });
    }
}

/// 生命周期消息发布器
///
/// 单个分发循环同时读取三个有界通道，每条消息由独立任务发布到消息总线，
/// 同时进行的发布数受信号量限制。发布失败只记录日志和计数。
pub struct LifecyclePublisher {
    queue: Arc<dyn MessageQueue>,
    topics: Arc<Topics>,
    lifecycle_rx: mpsc::Receiver<JobMsg>,
    immediate_rx: mpsc::Receiver<JobInfo>,
    status_rx: mpsc::Receiver<JobStatus>,
    max_in_flight: usize,
    stats: Arc<PublisherStats>,
}

impl LifecyclePublisher {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        mq_config: &MessageQueueConfig,
        config: &ManagementConfig,
    ) -> (Self, PublisherHandle) {
        let capacity = config.channel_capacity.max(1);
        let (lifecycle_tx, lifecycle_rx) = mpsc::channel(capacity);
        let (immediate_tx, immediate_rx) = mpsc::channel(capacity);
        let (status_tx, status_rx) = mpsc::channel(capacity);

        let topics = Arc::new(Topics {
            lifecycle: mq_config.lifecycle_topic.clone(),
            immediate: mq_config.immediate_topic.clone(),
            status: mq_config.status_topic.clone(),
        });
        let stats = Arc::new(PublisherStats::default());

        let handle = PublisherHandle {
            lifecycle_tx,
            immediate_tx,
            status_tx,
            topics: Arc::clone(&topics),
            submit_timeout: config.submit_timeout(),
            stats: Arc::clone(&stats),
        };

        let publisher = Self {
            queue,
            topics,
            lifecycle_rx,
            immediate_rx,
            status_rx,
            max_in_flight: config.max_in_flight.max(1),
            stats,
        };

        (publisher, handle)
    }

    pub fn spawn(self, shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown_rx))
    }

    /// 分发循环，收到停止信号后发布完已接收的消息再退出
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let LifecyclePublisher {
            queue,
            topics,
            mut lifecycle_rx,
            mut immediate_rx,
            mut status_rx,
            max_in_flight,
            stats,
        } = self;

        let dispatcher = Dispatcher {
            queue,
            in_flight: Arc::new(Semaphore::new(max_in_flight)),
            stats,
        };

        info!(
            "生命周期消息发布器已启动: topics=[{}, {}, {}], max_in_flight={}",
            topics.lifecycle, topics.immediate, topics.status, max_in_flight
        );

        loop {
            tokio::select! {
                Some(msg) = lifecycle_rx.recv() => {
                    dispatcher.dispatch(&topics.lifecycle, &msg).await;
                }
                Some(job) = immediate_rx.recv() => {
                    dispatcher.dispatch(&topics.immediate, &job).await;
                }
                Some(status) = status_rx.recv() => {
                    dispatcher.dispatch(&topics.status, &status).await;
                }
                _ = shutdown_rx.recv() => {
                    info!("发布器收到停止信号，处理剩余消息");
                    lifecycle_rx.close();
                    immediate_rx.close();
                    status_rx.close();
                    while let Some(msg) = lifecycle_rx.recv().await {
                        dispatcher.dispatch(&topics.lifecycle, &msg).await;
                    }
                    while let Some(job) = immediate_rx.recv().await {
                        dispatcher.dispatch(&topics.immediate, &job).await;
                    }
                    while let Some(status) = status_rx.recv().await {
                        dispatcher.dispatch(&topics.status, &status).await;
                    }
                    break;
                }
                else => break,
            }
        }

        dispatcher.wait_idle(max_in_flight).await;
        info!("生命周期消息发布器已停止");
    }
}

struct Dispatcher {
    queue: Arc<dyn MessageQueue>,
    in_flight: Arc<Semaphore>,
    stats: Arc<PublisherStats>,
}

impl Dispatcher {
    async fn dispatch<T: Serialize>(&self, topic: &str, message: &T) {
        let payload = match serde_json::to_vec(message) {
            Ok(payload) => payload,
            Err(e) => {
                error!("序列化消息失败: topic={}, error={}", topic, e);
                self.stats.record(topic, Outcome::Failed);
                return;
            }
        };

        let Ok(permit) = Arc::clone(&self.in_flight).acquire_owned().await else {
            return;
        };

        let queue = Arc::clone(&self.queue);
        let stats = Arc::clone(&self.stats);
        let topic = topic.to_string();
        tokio::spawn(async move {
            let _permit = permit;
            match queue.publish_message(&topic, &payload).await {
                Ok(()) => {
                    debug!("消息已发布: topic={}", topic);
                    stats.record(&topic, Outcome::Published);
                }
                Err(e) => {
                    error!("发布消息失败: topic={}, error={}", topic, e);
                    stats.record(&topic, Outcome::Failed);
                }
            }
        });
    }

    async fn wait_idle(&self, max_in_flight: usize) {
        let permits = u32::try_from(max_in_flight).unwrap_or(u32::MAX);
        let _ = self.in_flight.acquire_many(permits).await;
    }
}
