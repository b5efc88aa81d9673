use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use cronhub_core::{causes, models::JobInfoQueryParams, CronError};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::ApiError;

/// JSON请求体，解析失败时返回 `Invalid parameter`
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                warn!("请求体解析失败: {}", rejection.body_text());
                Err(CronError::bad_request(causes::INVALID_PARAMETER).into())
            }
        }
    }
}

/// 查询参数，解析失败时返回 `Invalid parameter`
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => {
                warn!("查询参数解析失败: {}", rejection.body_text());
                Err(CronError::bad_request(causes::INVALID_PARAMETER).into())
            }
        }
    }
}

/// 任务查询条件
///
/// `job_id` 可重复出现，也可逗号分隔；`limit`/`page` 缺省为1，无法解析时为0。
pub fn job_query(pairs: Vec<(String, String)>) -> JobInfoQueryParams {
    let mut params = JobInfoQueryParams {
        limit: 1,
        page: 1,
        ..Default::default()
    };

    for (key, value) in pairs {
        match key.as_str() {
            "job_id" => params.job_id.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string),
            ),
            "job_type" => params.job_type = value,
            "limit" => params.limit = value.trim().parse().unwrap_or(0),
            "page" => params.page = value.trim().parse().unwrap_or(0),
            "timestamp" => params.timestamp = value,
            _ => {}
        }
    }

    params
}
