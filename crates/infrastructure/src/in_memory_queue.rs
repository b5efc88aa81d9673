use std::collections::HashMap;

use async_trait::async_trait;
use cronhub_core::{traits::MessageQueue, CronResult};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

/// 每个主题缓存的消息数，慢订阅者超出后丢弃最旧的消息
const TOPIC_CAPACITY: usize = 1024;

/// 内存消息总线
///
/// 基于 Tokio broadcast channel，适用于单进程部署和测试。主题在首次使用时自动创建，
/// 发布时没有订阅者的消息直接丢弃。
#[derive(Debug, Default)]
pub struct InMemoryMessageQueue {
    topics: RwLock<HashMap<String, broadcast::Sender<Vec<u8>>>>,
}

impl InMemoryMessageQueue {
    pub fn new() -> Self {
        info!("使用内存消息总线");
        Self::default()
    }

    async fn sender(&self, topic: &str) -> broadcast::Sender<Vec<u8>> {
        if let Some(sender) = self.topics.read().await.get(topic) {
            return sender.clone();
        }

        self.topics
            .write()
            .await
            .entry(topic.to_string())
            .or_insert_with(|| {
                debug!("创建内存主题: {}", topic);
                broadcast::channel(TOPIC_CAPACITY).0
            })
            .clone()
    }

    /// 订阅主题，只收到订阅之后发布的消息
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<Vec<u8>> {
        self.sender(topic).await.subscribe()
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    async fn publish_message(&self, queue: &str, payload: &[u8]) -> CronResult<()> {
        match self.sender(queue).await.send(payload.to_vec()) {
            Ok(receivers) => debug!("消息已发布到内存主题: {}, 订阅者 {}", queue, receivers),
            Err(_) => debug!("内存主题 {} 没有订阅者，消息丢弃", queue),
        }
        Ok(())
    }
}
