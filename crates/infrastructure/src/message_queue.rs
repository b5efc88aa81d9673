use std::sync::Arc;

use async_trait::async_trait;
use cronhub_core::{
    config::MessageQueueConfig, errors::causes, traits::MessageQueue, CronError, CronResult,
};
use lapin::{
    options::*, types::FieldTable, BasicProperties, Channel, Connection, ConnectionProperties,
    Queue,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// RabbitMQ消息总线，每个主题对应一个持久化队列
pub struct RabbitMQMessageQueue {
    connection: Connection,
    channel: Arc<Mutex<Channel>>,
}

fn bus_error(context: &str, e: impl std::fmt::Display) -> CronError {
    error!("{}: {}", context, e);
    CronError::internal(causes::MSMQ_UNAVAILABLE)
}

impl RabbitMQMessageQueue {
    /// 连接RabbitMQ并声明三个主题队列
    pub async fn new(config: &MessageQueueConfig) -> CronResult<Self> {
        let connection = Connection::connect(&config.url, ConnectionProperties::default())
            .await
            .map_err(|e| bus_error("连接RabbitMQ失败", e))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| bus_error("创建通道失败", e))?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| bus_error("开启发布确认失败", e))?;

        info!("成功连接到RabbitMQ: {}", config.url);

        let queue = Self {
            connection,
            channel: Arc::new(Mutex::new(channel)),
        };

        {
            let channel = queue.channel.lock().await;
            for topic in config.topics() {
                Self::declare_queue(&channel, topic, true).await?;
            }
        }
        info!("消息主题初始化完成");

        Ok(queue)
    }

    async fn declare_queue(channel: &Channel, queue_name: &str, durable: bool) -> CronResult<Queue> {
        let queue = channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable,
                    exclusive: false,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| bus_error(&format!("声明队列 {queue_name} 失败"), e))?;

        debug!("队列 {} 声明成功", queue_name);
        Ok(queue)
    }

    pub async fn close(&self) -> CronResult<()> {
        self.connection
            .close(200, "正常关闭")
            .await
            .map_err(|e| bus_error("关闭连接失败", e))?;
        info!("RabbitMQ连接已关闭");
        Ok(())
    }
}

#[async_trait]
impl MessageQueue for RabbitMQMessageQueue {
    async fn publish_message(&self, queue: &str, payload: &[u8]) -> CronResult<()> {
        let channel = self.channel.lock().await;

        let confirm = channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_delivery_mode(2),
            )
            .await
            .map_err(|e| bus_error(&format!("发布消息到 {queue} 失败"), e))?;

        confirm
            .await
            .map_err(|e| bus_error("消息发布确认失败", e))?;

        debug!("消息已发布到: {}", queue);
        Ok(())
    }
}
