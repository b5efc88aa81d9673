use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use cronhub_core::{config::DatabaseConfig, errors::causes, CronError, CronResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 数据库连接管理
///
/// 连接池可在保活失败后整体替换，调用方每次通过 [`DatabaseManager::pool`] 取得当前连接池。
pub struct DatabaseManager {
    pool: RwLock<SqlitePool>,
    config: DatabaseConfig,
}

impl DatabaseManager {
    /// 打开数据库并建表
    pub async fn connect(config: &DatabaseConfig) -> CronResult<Self> {
        let pool = Self::open_pool(config).await?;
        info!("数据库连接成功: {}", config.url);
        Ok(Self {
            pool: RwLock::new(pool),
            config: config.clone(),
        })
    }

    /// 内存数据库，测试使用
    pub async fn in_memory() -> CronResult<Self> {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        };
        Self::connect(&config).await
    }

    fn is_memory(url: &str) -> bool {
        url.contains(":memory:") || url.contains("mode=memory")
    }

    async fn open_pool(config: &DatabaseConfig) -> CronResult<SqlitePool> {
        let mut options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| {
                error!("数据库地址解析失败: {}", e);
                CronError::internal(causes::OPEN_DATABASE)
            })?
            .create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds.max(1)));

        if Self::is_memory(&config.url) {
            // 内存库随最后一个连接关闭而消失，只保留一个常驻连接
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else {
            if let Some(dir) = options.get_filename().parent() {
                if !dir.as_os_str().is_empty() {
                    std::fs::create_dir_all(dir).map_err(|e| {
                        error!("创建数据库目录失败 {}: {}", dir.display(), e);
                        CronError::internal(causes::OPEN_DATABASE)
                    })?;
                }
            }
            options = options.journal_mode(SqliteJournalMode::Wal);
            pool_options = pool_options.max_connections(config.max_connections);
        }

        let pool = pool_options.connect_with(options).await.map_err(|e| {
            error!("打开数据库失败: {}", e);
            CronError::internal(causes::OPEN_DATABASE)
        })?;

        Self::run_migrations(&pool).await?;
        Ok(pool)
    }

    /// 运行数据库迁移
    async fn run_migrations(pool: &SqlitePool) -> CronResult<()> {
        debug!("初始化数据表");

        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS cron_jobs (
                job_id TEXT PRIMARY KEY,
                job_name TEXT NOT NULL,
                cron_time TEXT NOT NULL DEFAULT '',
                job_type INTEGER NOT NULL,
                job_context TEXT NOT NULL DEFAULT '{}',
                tenant_id TEXT NOT NULL DEFAULT '',
                enabled INTEGER NOT NULL DEFAULT 0,
                remarks TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL DEFAULT 0,
                UNIQUE (tenant_id, job_name)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS cron_job_status (
                execute_id TEXT PRIMARY KEY,
                job_id TEXT NOT NULL,
                job_type INTEGER NOT NULL,
                job_name TEXT NOT NULL DEFAULT '',
                job_status INTEGER NOT NULL,
                begin_at INTEGER NOT NULL DEFAULT 0,
                end_at INTEGER NOT NULL DEFAULT 0,
                executor TEXT NOT NULL DEFAULT '[]',
                execute_times INTEGER NOT NULL DEFAULT 0,
                ext_info TEXT NOT NULL DEFAULT '{}'
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_cron_jobs_created_at ON cron_jobs(created_at)",
            "CREATE INDEX IF NOT EXISTS idx_cron_jobs_job_type ON cron_jobs(job_type)",
            "CREATE INDEX IF NOT EXISTS idx_cron_job_status_job_id ON cron_job_status(job_id)",
            "CREATE INDEX IF NOT EXISTS idx_cron_job_status_begin_at ON cron_job_status(begin_at)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(pool).await.map_err(|e| {
                error!("初始化数据表失败: {}", e);
                CronError::internal(causes::OPEN_DATABASE)
            })?;
        }
        Ok(())
    }

    /// 当前连接池
    pub fn pool(&self) -> SqlitePool {
        self.pool
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub async fn ping(&self) -> CronResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool())
            .await
            .map_err(|e| {
                warn!("数据库探测失败: {}", e);
                CronError::internal(causes::PING_DATABASE)
            })?;
        Ok(())
    }

    /// 重新建立连接池并替换旧池
    pub async fn reconnect(&self) -> CronResult<()> {
        let fresh = Self::open_pool(&self.config).await?;
        let stale = {
            let mut guard = self
                .pool
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::replace(&mut *guard, fresh)
        };
        stale.close().await;
        info!("数据库已重新连接");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool().close().await;
    }

    /// 启动保活循环，探测失败时重连
    pub fn spawn_keep_alive(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("数据库保活已启动，间隔 {:?}", interval);
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        if self.ping().await.is_err() {
                            if let Err(e) = self.reconnect().await {
                                error!("数据库重连失败: {}", e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("数据库保活已停止");
                        break;
                    }
                }
            }
        })
    }
}
