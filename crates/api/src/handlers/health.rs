use axum::{extract::State, Json};

use crate::{error::ApiResult, routes::AppState};

/// 就绪检查，数据库不可用时返回错误
pub async fn ready(State(state): State<AppState>) -> ApiResult<Json<&'static str>> {
    state.service.ping().await?;
    Ok(Json("OK"))
}

pub async fn alive() -> Json<&'static str> {
    Json("OK")
}
