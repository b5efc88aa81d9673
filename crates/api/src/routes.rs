use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use cronhub_core::{traits::AuthClient, CronResult, ServiceContainer};
use cronhub_management::ManagementService;

use crate::handlers::{
    executions::{handle_webhook, trigger_execution},
    health::{alive, ready},
    jobs::{create_job, delete_jobs, get_job_total, list_jobs, set_enabled, set_notify, update_job},
    status::{list_status, upsert_status},
};
use crate::middleware::{request_logging, trace_layer};

pub const API_PREFIX: &str = "/api/cron/v1";

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub service: ManagementService,
    pub auth: Arc<dyn AuthClient>,
}

impl AppState {
    pub fn new(container: &ServiceContainer, service: ManagementService) -> CronResult<Self> {
        Ok(Self {
            service,
            auth: container.auth_client()?,
        })
    }
}

fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health/ready", get(ready))
        .route("/health/alive", get(alive))
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    let api = Router::new()
        .route("/jobs/total", get(get_job_total))
        .route("/jobs", get(list_jobs).post(create_job))
        .route("/jobs/{job_id}", put(update_job).delete(delete_jobs))
        .route("/jobs/{job_id}/enable", put(set_enabled))
        .route("/jobs/{job_id}/notify", put(set_notify))
        .route("/job-status", get(list_status))
        .route("/job-status/{execute_id}", put(upsert_status))
        .route("/job-executions", post(trigger_execution))
        .route("/webhook/{execute_id}", post(handle_webhook))
        .merge(health_routes());

    Router::new()
        .nest(API_PREFIX, api)
        .merge(health_routes())
        .layer(middleware::from_fn(request_logging))
        .layer(trace_layer())
        .with_state(state)
}
