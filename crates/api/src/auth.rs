use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use cronhub_core::models::Visitor;
use tracing::{debug, warn};

use crate::{error::ApiError, routes::AppState};

/// 管理员密钥请求头
pub const ADMIN_SECRET_HEADER: &str = "Secret";
/// 管理员一次性口令请求头
pub const ADMIN_CODE_HEADER: &str = "Code";
pub const BEARER_PREFIX: &str = "Bearer ";

/// 已认证的访问者
///
/// 先校验管理员密钥与口令，不通过再内省访问令牌。
#[derive(Debug, Clone)]
pub struct Authenticated(pub Visitor);

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or_default()
}

fn bearer_token(value: &str) -> &str {
    value
        .strip_prefix(BEARER_PREFIX)
        .or_else(|| value.strip_prefix("bearer "))
        .unwrap_or(value)
        .trim()
}

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let secret = header_value(&parts.headers, ADMIN_SECRET_HEADER);
        let code = header_value(&parts.headers, ADMIN_CODE_HEADER);
        if !secret.is_empty() && !code.is_empty() {
            if state.auth.verify_code(secret, code) {
                debug!("管理员认证通过");
                return Ok(Self(Visitor::admin()));
            }
            warn!("管理员口令校验失败，尝试令牌认证");
        }

        let token = bearer_token(header_value(&parts.headers, AUTHORIZATION.as_str()));
        let visitor = state.auth.verify_token(token).await.map_err(|e| {
            warn!("令牌认证失败: {}", e);
            ApiError::from(e)
        })?;

        Ok(Self(visitor))
    }
}
