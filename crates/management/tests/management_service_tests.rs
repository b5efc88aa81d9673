use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cronhub_core::{
    config::{ManagementConfig, MessageQueueConfig},
    errors::causes,
    models::{JobNotify, Visitor},
    traits::JobRepository,
    ErrorKind, ServiceContainer,
};
use cronhub_infrastructure::{DatabaseManager, SqliteJobRepository};
use cronhub_management::{LifecyclePublisher, ManagementService};
use cronhub_testing_utils::{
    JobInfoBuilder, JobStatusBuilder, MockBehavior, MockExecutor, MockMessageQueue,
};
use serde_json::json;
use tokio::sync::broadcast;

const WAIT: Duration = Duration::from_secs(2);
const LIFECYCLE: &str = "cron.topic.cron.job";
const IMMEDIATE: &str = "cron.topic.immediate.job";
const STATUS: &str = "cron.topic.job.status";

struct Harness {
    service: ManagementService,
    queue: MockMessageQueue,
    executor: Arc<MockExecutor>,
    repository: Arc<SqliteJobRepository>,
    _shutdown: broadcast::Sender<()>,
}

async fn harness_with(executor: MockExecutor, config: ManagementConfig) -> Result<Harness> {
    let db = Arc::new(DatabaseManager::in_memory().await?);
    let repository = Arc::new(SqliteJobRepository::new(db));
    let executor = Arc::new(executor);
    let queue = MockMessageQueue::new();

    let mut container = ServiceContainer::default();
    container.register_job_repository(repository.clone());
    container.register_executor(executor.clone());

    let (publisher, handle) =
        LifecyclePublisher::new(Arc::new(queue.clone()), &MessageQueueConfig::default(), &config);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    publisher.spawn(shutdown_rx);

    let service = ManagementService::new(&container, handle, &config)?;
    Ok(Harness {
        service,
        queue,
        executor,
        repository,
        _shutdown: shutdown_tx,
    })
}

fn config() -> ManagementConfig {
    ManagementConfig {
        service_id: "node-1".to_string(),
        webhook_base: "http://cronhub:8080/api/cron/v1/webhook/".to_string(),
        ..Default::default()
    }
}

async fn harness(behavior: MockBehavior) -> Result<Harness> {
    harness_with(MockExecutor::new(behavior), config()).await
}

fn tenant_a() -> Visitor {
    Visitor::tenant("tenant-a")
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn test_create_publishes_after_store() -> Result<()> {
    let h = harness(MockBehavior::Complete).await?;

    let job = JobInfoBuilder::new().with_tenant("someone-else").build();
    let job_id = h.service.create_job(job, &tenant_a()).await?;
    assert!(!job_id.is_empty());

    let messages = h.queue.wait_for(LIFECYCLE, 1, WAIT).await;
    assert_eq!(messages[0]["method"], "create");
    assert_eq!(messages[0]["data"]["job_id"], job_id.as_str());
    assert_eq!(messages[0]["data"]["tenant_id"], "tenant-a");

    let second = h
        .service
        .create_job(JobInfoBuilder::new().build(), &tenant_a())
        .await;
    let err = second.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
    assert_eq!(err.cause, causes::JOB_NAME_EXISTS);

    settle().await;
    assert_eq!(h.queue.count(LIFECYCLE), 1);
    Ok(())
}

#[tokio::test]
async fn test_update_missing_job_publishes_nothing() -> Result<()> {
    let h = harness(MockBehavior::Complete).await?;
    let visitor = tenant_a();

    let job_id = h
        .service
        .create_job(JobInfoBuilder::new().build(), &visitor)
        .await?;
    h.service
        .update_job(&job_id, JobInfoBuilder::new().with_name("renamed").build(), &visitor)
        .await?;

    let err = h
        .service
        .update_job("ghost", JobInfoBuilder::new().with_name("ghost").build(), &visitor)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let messages = h.queue.wait_for(LIFECYCLE, 2, WAIT).await;
    settle().await;
    assert_eq!(h.queue.count(LIFECYCLE), 2);
    let update = messages
        .iter()
        .find(|m| m["method"] == "update")
        .expect("update message");
    assert_eq!(update["data"]["job_id"], job_id.as_str());
    assert_eq!(update["data"]["job_name"], "renamed");
    Ok(())
}

#[tokio::test]
async fn test_batch_operations_publish_per_job() -> Result<()> {
    let h = harness(MockBehavior::Complete).await?;
    let visitor = tenant_a();

    let first = h
        .service
        .create_job(JobInfoBuilder::new().with_name("first").build(), &visitor)
        .await?;
    let second = h
        .service
        .create_job(JobInfoBuilder::new().with_name("second").build(), &visitor)
        .await?;
    let ids = format!("{first},{second}");

    h.service.set_enabled(&ids, false, &visitor).await?;
    let failed = h
        .service
        .set_notify(
            &ids,
            JobNotify {
                webhook: "http://notify/hook".to_string(),
            },
            &visitor,
        )
        .await?;
    assert!(failed.is_empty());
    h.service.delete_jobs(&ids, &visitor).await?;

    let messages = h.queue.wait_for(LIFECYCLE, 8, WAIT).await;
    assert_eq!(messages.len(), 8);

    let by_method = |method: &str| {
        messages
            .iter()
            .filter(|m| m["method"] == method)
            .cloned()
            .collect::<Vec<_>>()
    };
    let enable = by_method("enable");
    assert_eq!(enable.len(), 2);
    assert!(enable.iter().all(|m| m["data"]["enabled"] == false));

    let notify = by_method("notify");
    assert_eq!(notify.len(), 2);
    assert_eq!(
        notify[0]["data"]["job_context"]["notify"]["webhook"],
        "http://notify/hook"
    );

    let delete = by_method("delete");
    assert_eq!(delete.len(), 2);
    assert!(delete.iter().all(|m| m["data"]["tenant_id"] == "tenant-a"));

    let jobs = h
        .repository
        .get_job_total(&Default::default(), &visitor)
        .await?;
    assert_eq!(jobs.total, 0);
    Ok(())
}

#[tokio::test]
async fn test_enable_with_unknown_id_is_rejected() -> Result<()> {
    let h = harness(MockBehavior::Complete).await?;
    let visitor = tenant_a();
    let job_id = h
        .service
        .create_job(JobInfoBuilder::new().build(), &visitor)
        .await?;
    h.queue.wait_for(LIFECYCLE, 1, WAIT).await;

    let err = h
        .service
        .set_enabled(&format!("{job_id},ghost"), true, &visitor)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    settle().await;
    assert_eq!(h.queue.count(LIFECYCLE), 1);
    Ok(())
}

#[tokio::test]
async fn test_trigger_replies_before_execution() -> Result<()> {
    let h = harness_with(MockExecutor::gated(MockBehavior::Complete), config()).await?;

    let job = JobInfoBuilder::new().with_id("job-1").build();
    let status = h.service.trigger_execution(job, &tenant_a()).await?;

    assert_eq!(status.status, "executing");
    assert_eq!(status.execute_times, 1);
    assert_eq!(status.job_id, "job-1");
    assert!(!status.execute_id.is_empty());
    assert_eq!(status.executor.len(), 1);
    assert_eq!(status.executor[0].executor_id, "node-1");

    settle().await;
    assert!(h.executor.executed().is_empty());
    assert_eq!(h.queue.count(STATUS), 0);

    h.executor.release(1);
    let executed = h.executor.wait_for(1, WAIT).await;
    assert_eq!(executed[0].context.execute_id, status.execute_id);
    let headers = executed[0].context.info.headers.clone().unwrap_or_default();
    assert_eq!(
        headers.get("webhook").map(String::as_str),
        Some(format!("http://cronhub:8080/api/cron/v1/webhook/{}", status.execute_id).as_str())
    );

    let published = h.queue.wait_for(STATUS, 1, WAIT).await;
    assert_eq!(published[0]["job_status"], "success");
    assert_eq!(published[0]["execute_id"], status.execute_id.as_str());
    assert_ne!(published[0]["end_at"], "");
    assert_eq!(h.queue.count(IMMEDIATE), 0);
    Ok(())
}

#[tokio::test]
async fn test_failure_enqueues_one_retry_and_one_failure() -> Result<()> {
    let h = harness(MockBehavior::Fail).await?;

    let job = JobInfoBuilder::new().with_id("job-1").build();
    let status = h.service.trigger_execution(job, &tenant_a()).await?;

    let retries = h.queue.wait_for(IMMEDIATE, 1, WAIT).await;
    let statuses = h.queue.wait_for(STATUS, 1, WAIT).await;
    settle().await;
    assert_eq!(h.queue.count(IMMEDIATE), 1);
    assert_eq!(h.queue.count(STATUS), 1);

    assert_eq!(retries[0]["job_id"], "job-1");
    assert_eq!(retries[0]["job_type"], "real-time");
    assert_eq!(
        retries[0]["job_context"]["execute_id"],
        status.execute_id.as_str()
    );
    assert_eq!(statuses[0]["job_status"], "failure");
    assert_eq!(statuses[0]["ext_info"]["tenant_id"], "tenant-a");
    Ok(())
}

#[tokio::test]
async fn test_accepted_execution_waits_for_webhook() -> Result<()> {
    let h = harness(MockBehavior::Accept).await?;

    let job = JobInfoBuilder::new().with_id("job-1").with_mode("exe").build();
    let status = h.service.trigger_execution(job, &tenant_a()).await?;
    let executed = h.executor.wait_for(1, WAIT).await;
    assert!(executed[0].context.info.headers.is_none());

    settle().await;
    assert_eq!(h.queue.total(), 0);

    h.service
        .handle_webhook(&status.execute_id, json!({"rows": 42}));
    let published = h.queue.wait_for(STATUS, 1, WAIT).await;
    assert_eq!(published[0]["job_status"], "success");
    assert_eq!(published[0]["ext_info"]["result"]["rows"], 42);
    Ok(())
}

#[tokio::test]
async fn test_webhook_without_execute_id_is_noop() -> Result<()> {
    let h = harness(MockBehavior::Complete).await?;

    h.service.handle_webhook("", json!({"ignored": true}));
    h.service.handle_webhook("unknown-exec", json!("done"));

    let published = h.queue.wait_for(STATUS, 1, WAIT).await;
    settle().await;
    assert_eq!(h.queue.count(STATUS), 1);
    assert_eq!(published[0]["execute_id"], "unknown-exec");
    assert_eq!(published[0]["ext_info"]["result"], "done");
    Ok(())
}

#[tokio::test]
async fn test_retry_appends_to_stored_executor_log() -> Result<()> {
    let h = harness(MockBehavior::Complete).await?;
    let visitor = tenant_a();

    let stored = JobStatusBuilder::new("exec-1", "job-1")
        .with_status("failure")
        .with_execute_times(2)
        .with_executor("node-0", "2020-03-24T18:53:00Z")
        .build();
    h.repository.upsert_job_status(&[stored], &visitor).await?;

    let job = JobInfoBuilder::new()
        .with_id("job-1")
        .with_execute_id("exec-1")
        .build();
    let status = h.service.trigger_execution(job, &visitor).await?;

    assert_eq!(status.execute_id, "exec-1");
    assert_eq!(status.status, "executing");
    assert_eq!(status.execute_times, 2);
    let executors: Vec<_> = status
        .executor
        .iter()
        .map(|e| e.executor_id.as_str())
        .collect();
    assert_eq!(executors, vec!["node-0", "node-1"]);

    let executed = h.executor.wait_for(1, WAIT).await;
    assert_eq!(executed[0].context.execute_id, "exec-1");
    Ok(())
}

#[tokio::test]
async fn test_retry_cap_rejects_and_stops_retrying() -> Result<()> {
    let capped = ManagementConfig {
        max_execute_times: Some(2),
        ..config()
    };
    let h = harness_with(MockExecutor::new(MockBehavior::Fail), capped).await?;
    let visitor = tenant_a();

    let exhausted = JobStatusBuilder::new("exec-1", "job-1")
        .with_execute_times(2)
        .build();
    h.repository.upsert_job_status(&[exhausted], &visitor).await?;

    let job = JobInfoBuilder::new()
        .with_id("job-1")
        .with_execute_id("exec-1")
        .build();
    let err = h
        .service
        .trigger_execution(job, &visitor)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::TooManyRequests);
    assert_eq!(err.cause, causes::JOB_EXECUTED_TOO_MANY_TIMES);

    let last_try = JobStatusBuilder::new("exec-2", "job-1")
        .with_execute_times(1)
        .build();
    h.repository.upsert_job_status(&[last_try], &visitor).await?;
    let job = JobInfoBuilder::new()
        .with_id("job-1")
        .with_execute_id("exec-2")
        .build();
    h.service.trigger_execution(job, &visitor).await?;
    h.queue.wait_for(IMMEDIATE, 1, WAIT).await;

    let single_shot = ManagementConfig {
        max_execute_times: Some(1),
        ..config()
    };
    let h1 = harness_with(MockExecutor::new(MockBehavior::Fail), single_shot).await?;
    let job = JobInfoBuilder::new().with_id("job-1").build();
    h1.service.trigger_execution(job, &visitor).await?;

    let statuses = h1.queue.wait_for(STATUS, 1, WAIT).await;
    settle().await;
    assert_eq!(statuses[0]["job_status"], "failure");
    assert_eq!(h1.queue.count(IMMEDIATE), 0);

    assert_eq!(h.executor.executed().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_trigger_validates_request() -> Result<()> {
    let h = harness(MockBehavior::Complete).await?;

    let job = JobInfoBuilder::new().with_id("job-1").with_mode("ftp").build();
    let err = h
        .service
        .trigger_execution(job, &tenant_a())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::BadRequest);

    let job = JobInfoBuilder::new().with_id("").build();
    let err = h
        .service
        .trigger_execution(job, &tenant_a())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::BadRequest);

    settle().await;
    assert!(h.executor.executed().is_empty());
    assert_eq!(h.queue.total(), 0);
    Ok(())
}
