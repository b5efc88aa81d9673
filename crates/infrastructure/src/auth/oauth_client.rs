use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use cronhub_core::{
    config::AuthConfig,
    errors::causes,
    models::Visitor,
    time::now_timestamp,
    traits::AuthClient,
    CronError, CronResult,
};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};

use super::totp::verify_totp;

/// 身份服务可能暴露的令牌内省路径，按顺序探测
pub const INTROSPECT_PATH_CANDIDATES: [&str; 2] =
    ["/admin/oauth2/introspect", "/oauth2/introspect"];

#[derive(Debug, Default, Deserialize)]
struct IntrospectionResponse {
    #[serde(default)]
    active: bool,
    #[serde(default)]
    client_id: String,
    #[serde(default)]
    exp: i64,
    #[serde(default)]
    sub: String,
}

/// OAuth2令牌内省客户端
pub struct OAuthClient {
    http: reqwest::Client,
    admin_url: String,
    admin_secret: String,
    introspect_path: RwLock<Option<String>>,
}

impl OAuthClient {
    pub fn new(config: &AuthConfig) -> CronResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds.max(1)))
            .build()
            .map_err(|e| {
                error!("创建身份服务客户端失败: {}", e);
                CronError::internal(causes::AUTH_UNAVAILABLE)
            })?;

        Ok(Self {
            http,
            admin_url: config.admin_url.trim_end_matches('/').to_string(),
            admin_secret: config.admin_secret.clone(),
            introspect_path: RwLock::new(None),
        })
    }

    /// 已协商的内省路径
    pub fn introspect_path(&self) -> Option<String> {
        self.introspect_path
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    async fn post_introspect(&self, path: &str, token: &str) -> CronResult<reqwest::Response> {
        self.http
            .post(format!("{}{}", self.admin_url, path))
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| {
                warn!("请求身份服务失败: {}", e);
                CronError::internal(causes::AUTH_UNAVAILABLE)
            })
    }
}

#[async_trait]
impl AuthClient for OAuthClient {
    fn verify_code(&self, secret: &str, code: &str) -> bool {
        if self.admin_secret.is_empty() || secret != self.admin_secret {
            return false;
        }
        verify_totp(&self.admin_secret, code, now_timestamp().max(0) as u64)
    }

    #[instrument(skip(self, token))]
    async fn verify_token(&self, token: &str) -> CronResult<Visitor> {
        if token.is_empty() {
            return Err(CronError::unauthorized(causes::TOKEN_EMPTY));
        }

        let path = match self.introspect_path() {
            Some(path) => path,
            None => self.resolve_introspect_path().await?,
        };

        let response = self.post_introspect(&path, token).await?;
        if !response.status().is_success() {
            debug!("令牌内省返回 {}", response.status());
            return Err(CronError::unauthorized(causes::INVALID_TOKEN));
        }

        let introspection: IntrospectionResponse = response.json().await.map_err(|e| {
            warn!("解析令牌内省结果失败: {}", e);
            CronError::unauthorized(causes::INVALID_TOKEN)
        })?;

        if !introspection.active {
            return Err(CronError::unauthorized(causes::INVALID_TOKEN));
        }
        if introspection.exp > 0 && introspection.exp <= now_timestamp() {
            return Err(CronError::unauthorized(causes::TOKEN_EXPIRED));
        }

        let client_id = if introspection.client_id.is_empty() {
            introspection.sub.clone()
        } else {
            introspection.client_id
        };
        if client_id.is_empty() {
            return Err(CronError::unauthorized(causes::INVALID_TOKEN));
        }

        Ok(Visitor {
            name: if introspection.sub.is_empty() {
                client_id.clone()
            } else {
                introspection.sub
            },
            client_id,
            admin: false,
        })
    }

    async fn resolve_introspect_path(&self) -> CronResult<String> {
        for candidate in INTROSPECT_PATH_CANDIDATES {
            let response = self.post_introspect(candidate, "").await?;
            if response.status() == StatusCode::NOT_FOUND {
                debug!("内省路径不可用: {}", candidate);
                continue;
            }

            *self
                .introspect_path
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(candidate.to_string());
            info!("令牌内省路径: {}", candidate);
            return Ok(candidate.to_string());
        }

        error!("身份服务未提供令牌内省接口");
        Err(CronError::internal(causes::AUTH_UNAVAILABLE))
    }
}
