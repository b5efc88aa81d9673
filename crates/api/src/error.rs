use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cronhub_core::CronError;
use tracing::{debug, error};

/// 接口错误，响应体为 `{cause, code, message, detail}`
#[derive(Debug)]
pub struct ApiError(pub CronError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<CronError> for ApiError {
    fn from(err: CronError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!("请求处理失败: {}", self.0);
        } else {
            debug!("请求被拒绝: {}", self.0);
        }

        (status, Json(self.0.body())).into_response()
    }
}
