use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use cronhub_core::models::{JobInfo, JobStatus};
use serde_json::Value;
use tracing::warn;

use crate::{auth::Authenticated, error::ApiResult, extract::ApiJson, routes::AppState};

/// 立即执行任务，执行前即返回执行中状态
pub async fn trigger_execution(
    State(state): State<AppState>,
    Authenticated(visitor): Authenticated,
    ApiJson(job): ApiJson<JobInfo>,
) -> ApiResult<Json<JobStatus>> {
    Ok(Json(state.service.trigger_execution(job, &visitor).await?))
}

/// 异步执行完成回调
///
/// 需要与其他接口相同的认证；请求体不是合法JSON时只记录日志。
pub async fn handle_webhook(
    State(state): State<AppState>,
    Authenticated(_visitor): Authenticated,
    Path(execute_id): Path<String>,
    body: Bytes,
) -> StatusCode {
    match serde_json::from_slice::<Value>(&body) {
        Ok(result) => state.service.handle_webhook(&execute_id, result),
        Err(e) => warn!("回调请求体解析失败: execute_id={}, error={}", execute_id, e),
    }
    StatusCode::OK
}
