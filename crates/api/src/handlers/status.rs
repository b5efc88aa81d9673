use axum::{
    extract::{Path, State},
    Json,
};
use cronhub_core::models::{JobStatus, JobStatusQueryParams};

use super::FailedJobs;
use crate::{
    auth::Authenticated,
    error::ApiResult,
    extract::{ApiJson, ApiQuery},
    routes::AppState,
};

/// 查询执行状态
pub async fn list_status(
    State(state): State<AppState>,
    Authenticated(visitor): Authenticated,
    ApiQuery(params): ApiQuery<JobStatusQueryParams>,
) -> ApiResult<Json<Vec<JobStatus>>> {
    Ok(Json(state.service.list_status(&params, &visitor).await?))
}

/// 批量写入执行状态
///
/// 以请求体中每条记录自己的执行ID为准，路径参数不参与写入。
pub async fn upsert_status(
    State(state): State<AppState>,
    Authenticated(visitor): Authenticated,
    Path(_execute_id): Path<String>,
    ApiJson(statuses): ApiJson<Vec<JobStatus>>,
) -> ApiResult<Json<FailedJobs>> {
    let failed_job_id = state.service.upsert_status(&statuses, &visitor).await?;
    Ok(Json(FailedJobs { failed_job_id }))
}
