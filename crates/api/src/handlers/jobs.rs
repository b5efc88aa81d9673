use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use cronhub_core::models::{JobInfo, JobNotify, JobTotal, JobTotalQueryParams};
use serde::{Deserialize, Serialize};

use super::FailedJobs;
use crate::{
    auth::Authenticated,
    error::ApiResult,
    extract::{job_query, ApiJson, ApiQuery},
    routes::AppState,
};

#[derive(Debug, Serialize)]
pub struct CreatedJob {
    pub job_id: String,
}

#[derive(Debug, Deserialize)]
pub struct EnableRequest {
    pub enable: bool,
}

/// 任务总数
pub async fn get_job_total(
    State(state): State<AppState>,
    Authenticated(visitor): Authenticated,
    ApiQuery(params): ApiQuery<JobTotalQueryParams>,
) -> ApiResult<Json<JobTotal>> {
    Ok(Json(state.service.count_jobs(&params, &visitor).await?))
}

/// 查询任务
pub async fn list_jobs(
    State(state): State<AppState>,
    Authenticated(visitor): Authenticated,
    ApiQuery(pairs): ApiQuery<Vec<(String, String)>>,
) -> ApiResult<Json<Vec<JobInfo>>> {
    let params = job_query(pairs);
    Ok(Json(state.service.list_jobs(&params, &visitor).await?))
}

/// 创建任务
pub async fn create_job(
    State(state): State<AppState>,
    Authenticated(visitor): Authenticated,
    ApiJson(job): ApiJson<JobInfo>,
) -> ApiResult<(StatusCode, Json<CreatedJob>)> {
    let job_id = state.service.create_job(job, &visitor).await?;
    Ok((StatusCode::CREATED, Json(CreatedJob { job_id })))
}

pub async fn update_job(
    State(state): State<AppState>,
    Authenticated(visitor): Authenticated,
    Path(job_id): Path<String>,
    ApiJson(job): ApiJson<JobInfo>,
) -> ApiResult<StatusCode> {
    state.service.update_job(&job_id, job, &visitor).await?;
    Ok(StatusCode::OK)
}

/// 删除任务，路径中为逗号分隔的任务ID
pub async fn delete_jobs(
    State(state): State<AppState>,
    Authenticated(visitor): Authenticated,
    Path(job_ids): Path<String>,
) -> ApiResult<StatusCode> {
    state.service.delete_jobs(&job_ids, &visitor).await?;
    Ok(StatusCode::OK)
}

pub async fn set_enabled(
    State(state): State<AppState>,
    Authenticated(visitor): Authenticated,
    Path(job_ids): Path<String>,
    ApiJson(request): ApiJson<EnableRequest>,
) -> ApiResult<StatusCode> {
    state
        .service
        .set_enabled(&job_ids, request.enable, &visitor)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn set_notify(
    State(state): State<AppState>,
    Authenticated(visitor): Authenticated,
    Path(job_ids): Path<String>,
    ApiJson(notify): ApiJson<JobNotify>,
) -> ApiResult<Json<FailedJobs>> {
    let failed_job_id = state.service.set_notify(&job_ids, notify, &visitor).await?;
    Ok(Json(FailedJobs { failed_job_id }))
}
