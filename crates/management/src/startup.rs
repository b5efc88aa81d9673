use std::time::Duration;

use cronhub_core::traits::AuthClient;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// 等待身份服务协商出令牌内省路径
///
/// 失败后按 `interval` 重试，直到成功或收到停止信号（返回 `None`）。
pub async fn wait_for_auth(
    auth: &dyn AuthClient,
    interval: Duration,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> Option<String> {
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match auth.resolve_introspect_path().await {
            Ok(path) => {
                info!("身份服务内省路径: {} (第{}次尝试)", path, attempts);
                return Some(path);
            }
            Err(e) => {
                warn!("协商身份服务失败: {}，{:?}后重试", e, interval);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown_rx.recv() => {
                info!("等待身份服务时收到停止信号");
                return None;
            }
        }
    }
}
