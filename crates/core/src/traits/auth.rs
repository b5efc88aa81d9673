use async_trait::async_trait;

use crate::{models::Visitor, CronResult};

/// 授权客户端
#[async_trait]
pub trait AuthClient: Send + Sync {
    /// 校验管理员密钥与一次性口令
    fn verify_code(&self, secret: &str, code: &str) -> bool;

    /// 内省访问令牌，返回访问者
    async fn verify_token(&self, token: &str) -> CronResult<Visitor>;

    /// 协商身份服务的令牌内省路径
    async fn resolve_introspect_path(&self) -> CronResult<String>;
}
