//! # CronHub API
//!
//! 定时任务管理服务的HTTP接口，基于Axum构建。
//!
//! 所有接口挂载在 `/api/cron/v1` 下，健康检查同时挂载在根路径。
//! 除webhook回调外，请求需携带 `Authorization: Bearer <token>`，
//! 或管理员的 `Secret` + `Code` 请求头。
//!
//! ```text
//! GET    /jobs/total                 任务总数
//! GET    /jobs                       查询任务
//! POST   /jobs                       创建任务
//! PUT    /jobs/{id}                  修改任务
//! DELETE /jobs/{ids}                 删除任务
//! PUT    /jobs/{ids}/enable          启用/禁用
//! PUT    /jobs/{ids}/notify          修改通知地址
//! GET    /job-status                 查询执行状态
//! PUT    /job-status/{execute_id}    批量写入执行状态
//! POST   /job-executions             立即执行
//! POST   /webhook/{execute_id}       异步执行完成回调
//! GET    /health/ready, /health/alive
//! ```
//!
//! 错误响应体为 `{cause, code, message, detail}`，HTTP状态码取 `code` 的前三位。

pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use routes::{create_routes, AppState, API_PREFIX};
