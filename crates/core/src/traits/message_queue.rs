use async_trait::async_trait;

use crate::CronResult;

/// 消息总线抽象接口，消息体为JSON字节
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// 发布消息到指定主题
    async fn publish_message(&self, queue: &str, payload: &[u8]) -> CronResult<()>;
}
