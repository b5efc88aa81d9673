use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cronhub_api::{create_routes, AppState};
use cronhub_core::{
    config::{AppConfig, MessageQueueType},
    traits::{AuthClient, MessageQueue},
    ServiceContainer,
};
use cronhub_infrastructure::{
    DatabaseManager, InMemoryMessageQueue, OAuthClient, RabbitMQMessageQueue, SqliteJobRepository,
};
use cronhub_management::{wait_for_auth, LifecyclePublisher, ManagementService};
use cronhub_worker::ExecutorFactory;
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info, warn};

use crate::shutdown::ShutdownManager;

/// 后台任务停止的等待上限
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// 主应用程序
pub struct Application {
    config: AppConfig,
    container: ServiceContainer,
    database: Arc<DatabaseManager>,
    rabbitmq: Option<Arc<RabbitMQMessageQueue>>,
}

impl Application {
    /// 连接数据库与消息总线，构建执行器与授权客户端
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("连接数据库: {}", mask_url(&config.database.url));
        let database = Arc::new(
            DatabaseManager::connect(&config.database)
                .await
                .context("连接数据库失败")?,
        );

        let mut container = ServiceContainer::default();
        container.register_job_repository(Arc::new(SqliteJobRepository::new(Arc::clone(
            &database,
        ))));

        let rabbitmq = match config.message_queue.kind {
            MessageQueueType::Rabbitmq => {
                info!("连接消息队列: {}", mask_url(&config.message_queue.url));
                let queue = Arc::new(
                    RabbitMQMessageQueue::new(&config.message_queue)
                        .await
                        .context("连接消息队列失败")?,
                );
                container.register_message_queue(Arc::clone(&queue) as Arc<dyn MessageQueue>);
                Some(queue)
            }
            MessageQueueType::Memory => {
                warn!("使用内存消息总线，消息不会离开本进程");
                container.register_message_queue(Arc::new(InMemoryMessageQueue::new()));
                None
            }
        };

        let executor = ExecutorFactory::from_config(&config.executor).context("创建执行器失败")?;
        container.register_executor(Arc::new(executor));

        let auth = OAuthClient::new(&config.auth).context("创建身份服务客户端失败")?;
        container.register_auth_client(Arc::new(auth));

        Ok(Self {
            config,
            container,
            database,
            rabbitmq,
        })
    }

    /// 运行到收到关闭信号
    pub async fn run(self, shutdown: ShutdownManager) -> Result<()> {
        let keep_alive = Arc::clone(&self.database).spawn_keep_alive(
            self.config.database.ping_interval(),
            shutdown.subscribe().await,
        );

        let auth: Arc<dyn AuthClient> = self.container.auth_client()?;
        let mut auth_shutdown = shutdown.subscribe().await;
        let negotiated = wait_for_auth(
            auth.as_ref(),
            self.config.auth.negotiate_interval(),
            &mut auth_shutdown,
        )
        .await;
        if negotiated.is_none() {
            info!("启动阶段收到关闭信号");
            shutdown.drain("数据库保活", DRAIN_TIMEOUT, keep_alive).await;
            self.database.close().await;
            return Ok(());
        }

        let (publisher, handle) = LifecyclePublisher::new(
            self.container.message_queue()?,
            &self.config.message_queue,
            &self.config.management,
        );
        let publisher_task = publisher.spawn(shutdown.subscribe().await);

        let service = ManagementService::new(&self.container, handle.clone(), &self.config.management)?;
        info!("服务实例: {}", service.service_id());
        let state = AppState::new(&self.container, service)?;
        let app = create_routes(state);

        let bind_address = &self.config.server.bind_address;
        let listener = TcpListener::bind(bind_address)
            .await
            .with_context(|| format!("绑定地址失败: {bind_address}"))?;
        info!("API服务器启动在 http://{}", bind_address);

        let server_shutdown = shutdown.subscribe().await;
        if let Err(e) = axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(wait_signal(server_shutdown))
            .await
        {
            error!("API服务器运行失败: {}", e);
        }
        info!("API服务器已停止");

        // 服务器异常退出时也要让后台任务停下
        shutdown.shutdown().await;
        shutdown.drain("生命周期消息发布", DRAIN_TIMEOUT, publisher_task).await;
        shutdown.drain("数据库保活", DRAIN_TIMEOUT, keep_alive).await;
        info!("生命周期消息统计: {:?}", handle.stats());

        if let Some(queue) = &self.rabbitmq {
            if let Err(e) = queue.close().await {
                warn!("关闭消息队列失败: {}", e);
            }
        }
        self.database.close().await;
        Ok(())
    }
}

async fn wait_signal(mut shutdown_rx: broadcast::Receiver<()>) {
    let _ = shutdown_rx.recv().await;
    info!("API服务器收到关闭信号");
}

/// 屏蔽URL中的密码
fn mask_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if !url[colon_pos..].starts_with("://") {
                let mut masked = url.to_string();
                masked.replace_range(colon_pos + 1..at_pos, "***");
                return masked;
            }
        }
    }
    url.to_string()
}
