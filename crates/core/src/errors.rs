use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 服务标识，组合错误码的后六位
pub const SERVICE_IDENTIFIER: i64 = 9001;

/// 错误原因字符串，作为错误响应中的 `cause` 字段返回
pub mod causes {
    pub const DATABASE_UNAVAILABLE: &str = "Database is unavailable";
    pub const DATABASE_DISCONNECTED: &str = "Database is disconnected";
    pub const MSMQ_UNAVAILABLE: &str = "Msmq client is unavailable";
    pub const EXECUTOR_UNAVAILABLE: &str = "Executor is unavailable";
    pub const AUTH_UNAVAILABLE: &str = "Auth client is unavailable";
    pub const UNSUPPORTED_EXECUTION_MODE: &str = "Unsupported execution mode";
    pub const JOB_EXECUTED_TOO_MANY_TIMES: &str = "Too many job executions";
    pub const JOB_NAME_EXISTS: &str = "Job name already exists";
    pub const JOB_NAME_EMPTY: &str = "Job name is empty";
    pub const INSERT_JOB: &str = "Add job error";
    pub const UPDATE_JOB: &str = "Job update error";
    pub const TRANSACTION_BEGIN: &str = "Transaction begin error";
    pub const DELETE_JOB: &str = "Delete job error";
    pub const UPDATE_JOB_DELETED_FLAG: &str = "Error in updating job to delete flag";
    pub const COMMIT: &str = "Submission error";
    pub const UPDATE_JOB_STATUS: &str = "Error in job status updating";
    pub const BATCH_JOB_ENABLE: &str = "Error in batch job enabling";
    pub const BATCH_JOB_NOTIFY: &str = "Error in batch job notification";
    pub const OPEN_DATABASE: &str = "Database open error";
    pub const PING_DATABASE: &str = "Ping database error";
    pub const QUERY_JOB: &str = "Job query error";
    pub const SCAN_FIELD_VALUE: &str = "Error in field value scanning";
    pub const QUERY_JOB_TOTAL: &str = "Error in job count query";
    pub const QUERY_JOB_STATUS: &str = "Error in job status query";
    pub const QUERY_PARAMETER_IS_NULL: &str = "Query parameters is null";
    pub const INVALID_PARAMETER: &str = "Invalid parameter";
    pub const JOB_NOT_EXIST: &str = "This job does not exist";
    pub const BEGIN_TIME_GREATER_THAN_END_TIME: &str = "End time is earlier than start time";
    pub const TIME_ILLEGAL: &str = "Illegal time ";
    pub const CRON_TIME: &str = "Cron time error";
    pub const QUERY_JOB_NAME: &str = "Error in job name query";
    pub const QUERY_JOB_ID: &str = "Error in job ID query";
    pub const MARSHAL_JSON: &str = "Failed to serialize json";
    pub const UNMARSHAL_JSON: &str = "Failed to deserialize json";
    pub const JOB_TYPE_ILLEGAL: &str = "Illegal job type";
    pub const JOB_STATUS_ILLEGAL: &str = "Illegal job status";
    pub const LIMIT_OR_PAGE_ILLEGAL: &str = "Limit or page illegal";
    pub const STATUS_EMPTY: &str = "Empty status";
    pub const INVALID_TOKEN: &str = "Invalid token";
    pub const TOKEN_EXPIRED: &str = "Token expired";
    pub const TOKEN_EMPTY: &str = "Empty token";
}

/// 错误分类，决定HTTP状态码与组合错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    NotFound,
    Conflict,
    TooManyRequests,
    Internal,
}

impl ErrorKind {
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::TooManyRequests => 429,
            ErrorKind::Internal => 500,
        }
    }

    /// 九位组合错误码，例如 409009001
    pub fn code(self) -> i64 {
        i64::from(self.status_code()) * 1_000_000 + SERVICE_IDENTIFIER
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "Bad request",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::NotFound => "Not found",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::TooManyRequests => "Too many requests",
            ErrorKind::Internal => "Internal error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// 错误详情，指明出错的字段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorDetail {
    #[serde(rename = "conflicts")]
    Conflicts(Vec<String>),
    #[serde(rename = "parameters")]
    Parameters(Vec<String>),
}

impl ErrorDetail {
    pub fn fields(&self) -> &[String] {
        match self {
            ErrorDetail::Conflicts(fields) | ErrorDetail::Parameters(fields) => fields,
        }
    }
}

/// 定时服务错误
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {cause}")]
pub struct CronError {
    pub kind: ErrorKind,
    pub cause: String,
    pub detail: Option<ErrorDetail>,
}

/// 统一的Result类型
pub type CronResult<T> = Result<T, CronError>;

impl CronError {
    pub fn new(kind: ErrorKind, cause: impl Into<String>) -> Self {
        Self {
            kind,
            cause: cause.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: ErrorDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn bad_request(cause: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, cause)
    }

    /// 参数错误，`parameters` 详情中列出出错字段
    pub fn bad_request_params(cause: impl Into<String>, fields: &[&str]) -> Self {
        Self::bad_request(cause).with_detail(ErrorDetail::Parameters(to_owned(fields)))
    }

    pub fn not_found(cause: impl Into<String>, fields: &[&str]) -> Self {
        Self::new(ErrorKind::NotFound, cause).with_detail(ErrorDetail::Conflicts(to_owned(fields)))
    }

    pub fn conflict(cause: impl Into<String>, fields: &[&str]) -> Self {
        Self::new(ErrorKind::Conflict, cause).with_detail(ErrorDetail::Conflicts(to_owned(fields)))
    }

    pub fn unauthorized(cause: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, cause)
    }

    pub fn too_many_requests(cause: impl Into<String>) -> Self {
        Self::new(ErrorKind::TooManyRequests, cause)
    }

    pub fn internal(cause: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, cause)
    }

    pub fn code(&self) -> i64 {
        self.kind.code()
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            cause: self.cause.clone(),
            code: self.code(),
            message: self.kind.message().to_string(),
            detail: self.detail.clone(),
        }
    }
}

fn to_owned(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

/// 错误响应体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub cause: String,
    pub code: i64,
    pub message: String,
    pub detail: Option<ErrorDetail>,
}
