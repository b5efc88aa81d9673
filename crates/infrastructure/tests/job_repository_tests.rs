use std::sync::Arc;

use anyhow::Result;
use cronhub_core::{
    errors::causes,
    models::{JobInfoQueryParams, JobNotify, JobStatusQueryParams, JobTotalQueryParams, Visitor},
    traits::JobRepository,
    ErrorKind,
};
use cronhub_infrastructure::{DatabaseManager, SqliteJobRepository};
use cronhub_testing_utils::{JobInfoBuilder, JobStatusBuilder};

async fn setup() -> Result<(Arc<DatabaseManager>, SqliteJobRepository)> {
    let db = Arc::new(DatabaseManager::in_memory().await?);
    let repo = SqliteJobRepository::new(db.clone());
    Ok((db, repo))
}

fn tenant_a() -> Visitor {
    Visitor::tenant("tenant-a")
}

fn by_ids(ids: &[&str]) -> JobInfoQueryParams {
    JobInfoQueryParams {
        job_id: ids.iter().map(|id| id.to_string()).collect(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_job_crud() -> Result<()> {
    let (_db, repo) = setup().await?;
    let visitor = tenant_a();

    let job = JobInfoBuilder::new()
        .with_id("job-1")
        .with_remarks("organize backups")
        .with_window("2020-03-24T18:53:00Z", "2030-03-24T18:53:00Z")
        .build();
    repo.create_job(&job, &visitor).await?;

    let jobs = repo.get_jobs(&by_ids(&["job-1"]), &visitor).await?;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_name, "nightly-report");
    assert_eq!(jobs[0].job_type, "scheduled");
    assert_eq!(jobs[0].context.exec, "http://127.0.0.1:9/run");
    assert_eq!(jobs[0].context.begin_time, "2020-03-24T18:53:00Z");
    assert_eq!(jobs[0].remarks, "organize backups");
    assert!(jobs[0].enabled);

    let updated = JobInfoBuilder::new()
        .with_id("job-1")
        .with_name("weekly-report")
        .with_cron("@daily")
        .with_enabled(false)
        .build();
    repo.update_job(&updated, &visitor).await?;

    let jobs = repo.get_jobs(&by_ids(&["job-1"]), &visitor).await?;
    assert_eq!(jobs[0].job_name, "weekly-report");
    assert_eq!(jobs[0].cron_time, "@daily");
    assert!(!jobs[0].enabled);

    repo.delete_jobs("job-1", &visitor).await?;
    let err = repo.get_jobs(&by_ids(&["job-1"]), &visitor).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.cause, causes::JOB_NOT_EXIST);

    Ok(())
}

#[tokio::test]
async fn test_step_cron_expressions_are_accepted() -> Result<()> {
    let (_db, repo) = setup().await?;
    let visitor = tenant_a();

    for (i, cron) in ["0 */5 * * * *", "*/10 * * * * *", "0 0 */2 * * *"].iter().enumerate() {
        let job = JobInfoBuilder::new()
            .with_id(&format!("job-{i}"))
            .with_name(&format!("report-{i}"))
            .with_cron(cron)
            .build();
        repo.create_job(&job, &visitor).await?;
    }

    let updated = JobInfoBuilder::new()
        .with_id("job-0")
        .with_name("report-0")
        .with_cron("0 0 */6 * * *")
        .build();
    repo.update_job(&updated, &visitor).await?;

    let jobs = repo.get_jobs(&by_ids(&["job-0", "job-1"]), &visitor).await?;
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().any(|job| job.cron_time == "0 0 */6 * * *"));
    assert!(jobs.iter().any(|job| job.cron_time == "*/10 * * * * *"));

    Ok(())
}

#[tokio::test]
async fn test_duplicate_name_is_conflict() -> Result<()> {
    let (_db, repo) = setup().await?;
    let visitor = tenant_a();

    repo.create_job(&JobInfoBuilder::new().with_id("a").build(), &visitor)
        .await?;
    let err = repo
        .create_job(&JobInfoBuilder::new().with_id("b").build(), &visitor)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
    assert_eq!(err.cause, causes::JOB_NAME_EXISTS);
    assert_eq!(err.body().code, 409009001);

    // 同名任务在其他租户下可以创建
    let other = JobInfoBuilder::new().with_id("c").with_tenant("tenant-b").build();
    repo.create_job(&other, &Visitor::tenant("tenant-b")).await?;

    // 更新为同租户已有名称
    repo.create_job(
        &JobInfoBuilder::new().with_id("d").with_name("other").build(),
        &visitor,
    )
    .await?;
    let err = repo
        .update_job(&JobInfoBuilder::new().with_id("d").build(), &visitor)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);

    Ok(())
}

#[tokio::test]
async fn test_create_validation_order() -> Result<()> {
    let (_db, repo) = setup().await?;
    let visitor = tenant_a();

    let err = repo
        .create_job(&JobInfoBuilder::new().with_name("").build(), &visitor)
        .await
        .unwrap_err();
    assert_eq!(err.cause, causes::JOB_NAME_EMPTY);

    let err = repo
        .create_job(
            &JobInfoBuilder::new()
                .with_window("2030-01-01T00:00:00Z", "2020-01-01T00:00:00Z")
                .build(),
            &visitor,
        )
        .await
        .unwrap_err();
    assert_eq!(err.cause, causes::BEGIN_TIME_GREATER_THAN_END_TIME);

    let err = repo
        .create_job(&JobInfoBuilder::new().with_mode("ftp").build(), &visitor)
        .await
        .unwrap_err();
    assert_eq!(err.cause, causes::UNSUPPORTED_EXECUTION_MODE);

    let err = repo
        .create_job(&JobInfoBuilder::new().with_cron("*/5 * * * *").build(), &visitor)
        .await
        .unwrap_err();
    assert_eq!(err.cause, causes::CRON_TIME);

    let err = repo
        .create_job(&JobInfoBuilder::new().with_type("hourly").build(), &visitor)
        .await
        .unwrap_err();
    assert_eq!(err.cause, causes::JOB_TYPE_ILLEGAL);
    assert_eq!(err.kind, ErrorKind::BadRequest);

    let err = repo
        .update_job(&JobInfoBuilder::new().with_id("missing").build(), &visitor)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    Ok(())
}

#[tokio::test]
async fn test_injection_rejected_before_storage() -> Result<()> {
    let (db, repo) = setup().await?;
    db.close().await;
    let visitor = tenant_a();

    let err = repo
        .create_job(
            &JobInfoBuilder::new().with_name("x' or '1'='1").build(),
            &visitor,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::BadRequest);
    assert_eq!(err.cause, causes::INVALID_PARAMETER);
    assert_eq!(err.detail.unwrap().fields(), ["job_name".to_string()]);

    let err = repo
        .delete_jobs("a;DROP TABLE cron_jobs", &visitor)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::BadRequest);

    let err = repo
        .get_jobs(&by_ids(&["a", "b--"]), &visitor)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::BadRequest);

    Ok(())
}

#[tokio::test]
async fn test_tenant_isolation() -> Result<()> {
    let (_db, repo) = setup().await?;
    let a = tenant_a();
    let b = Visitor::tenant("tenant-b");

    repo.create_job(&JobInfoBuilder::new().with_id("job-a").build(), &a)
        .await?;
    repo.create_job(
        &JobInfoBuilder::new().with_id("job-b").with_tenant("tenant-b").build(),
        &b,
    )
    .await?;

    let err = repo.get_jobs(&by_ids(&["job-a"]), &b).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let err = repo
        .update_job(
            &JobInfoBuilder::new().with_id("job-a").with_name("stolen").build(),
            &b,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    // 其他租户的删除不影响任务
    repo.delete_jobs("job-a", &b).await?;
    assert_eq!(repo.get_jobs(&by_ids(&["job-a"]), &a).await?.len(), 1);

    let page = JobInfoQueryParams {
        page: 1,
        limit: 10,
        ..Default::default()
    };
    let listed = repo.get_jobs(&page, &a).await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].job_id, "job-a");

    let all = repo.get_jobs(&page, &Visitor::admin()).await?;
    assert_eq!(all.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_paged_listing() -> Result<()> {
    let (_db, repo) = setup().await?;
    let visitor = tenant_a();

    for (i, created) in [
        "2020-01-01T00:00:00Z",
        "2020-01-02T00:00:00Z",
        "2020-01-03T00:00:00Z",
    ]
    .iter()
    .enumerate()
    {
        let job = JobInfoBuilder::new()
            .with_id(&format!("job-{i}"))
            .with_name(&format!("report-{i}"))
            .with_type(if i == 0 { "timed" } else { "scheduled" })
            .with_created_at(created)
            .build();
        repo.create_job(&job, &visitor).await?;
    }

    let page = |page, limit| JobInfoQueryParams {
        page,
        limit,
        ..Default::default()
    };

    let first = repo.get_jobs(&page(1, 2), &visitor).await?;
    assert_eq!(
        first.iter().map(|j| j.job_id.as_str()).collect::<Vec<_>>(),
        ["job-2", "job-1"]
    );
    let second = repo.get_jobs(&page(2, 2), &visitor).await?;
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].job_id, "job-0");

    let mut timed = page(1, 10);
    timed.job_type = "timed".to_string();
    assert_eq!(repo.get_jobs(&timed, &visitor).await?.len(), 1);

    let mut before = page(1, 10);
    before.timestamp = "2020-01-02T00:00:00Z".to_string();
    assert_eq!(repo.get_jobs(&before, &visitor).await?.len(), 2);

    for (p, l) in [(0, 10), (1, -1)] {
        let err = repo.get_jobs(&page(p, l), &visitor).await.unwrap_err();
        assert_eq!(err.cause, causes::LIMIT_OR_PAGE_ILLEGAL);
        assert_eq!(
            err.detail.unwrap().fields(),
            ["page".to_string(), "limit".to_string()]
        );
    }

    let mut bad_time = page(1, 10);
    bad_time.timestamp = "yesterday".to_string();
    let err = repo.get_jobs(&bad_time, &visitor).await.unwrap_err();
    assert_eq!(err.cause, causes::TIME_ILLEGAL);

    Ok(())
}

#[tokio::test]
async fn test_job_total() -> Result<()> {
    let (_db, repo) = setup().await?;
    let visitor = tenant_a();

    for (i, created) in ["2020-01-01T00:00:00Z", "2021-01-01T00:00:00Z"]
        .iter()
        .enumerate()
    {
        let job = JobInfoBuilder::new()
            .with_id(&format!("job-{i}"))
            .with_name(&format!("report-{i}"))
            .with_created_at(created)
            .build();
        repo.create_job(&job, &visitor).await?;
    }

    let total = repo
        .get_job_total(&JobTotalQueryParams::default(), &visitor)
        .await?;
    assert_eq!(total.total, 2);
    assert!(!total.timestamp.is_empty());

    let window = JobTotalQueryParams {
        begin_time: "2020-06-01T00:00:00Z".to_string(),
        end_time: String::new(),
    };
    assert_eq!(repo.get_job_total(&window, &visitor).await?.total, 1);

    let other = repo
        .get_job_total(&JobTotalQueryParams::default(), &Visitor::tenant("tenant-b"))
        .await?;
    assert_eq!(other.total, 0);

    Ok(())
}

#[tokio::test]
async fn test_batch_existence_across_chunk_sizes() -> Result<()> {
    let (db, _) = setup().await?;
    let visitor = tenant_a();
    let seed = SqliteJobRepository::new(db.clone());

    let mut ids = Vec::new();
    for i in 0..21 {
        let id = format!("job-{i:02}");
        seed.create_job(
            &JobInfoBuilder::new()
                .with_id(&id)
                .with_name(&format!("report-{i}"))
                .build(),
            &visitor,
        )
        .await?;
        ids.push(id);
    }
    ids.insert(4, "ghost-1".to_string());
    ids.insert(18, "ghost-2".to_string());
    assert_eq!(ids.len(), 23);
    assert_eq!(ids[18], "ghost-2");

    for size in [10, 7, 3] {
        let repo = SqliteJobRepository::new(db.clone()).with_id_chunk_size(size);
        let missing = repo.missing_job_ids(&ids, &visitor).await?;
        assert_eq!(missing, ["ghost-1", "ghost-2"], "chunk size {size}");

        let err = repo
            .batch_set_enabled(&ids, false, "2020-01-01T00:00:00Z", &visitor)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    // 失败的批量操作没有修改任何任务
    let jobs = seed.get_jobs(&by_ids(&["job-00", "job-20"]), &visitor).await?;
    assert!(jobs.iter().all(|job| job.enabled));

    Ok(())
}

#[tokio::test]
async fn test_batch_enable_and_notify() -> Result<()> {
    let (_db, repo) = setup().await?;
    let visitor = tenant_a();

    let ids: Vec<String> = (0..3).map(|i| format!("job-{i}")).collect();
    for (i, id) in ids.iter().enumerate() {
        repo.create_job(
            &JobInfoBuilder::new()
                .with_id(id)
                .with_name(&format!("report-{i}"))
                .build(),
            &visitor,
        )
        .await?;
    }

    repo.batch_set_enabled(&ids[..2], false, "2021-01-01T00:00:00Z", &visitor)
        .await?;
    let jobs = repo.get_jobs(&by_ids(&["job-0", "job-1", "job-2"]), &visitor).await?;
    for job in &jobs {
        assert_eq!(job.enabled, job.job_id == "job-2", "{}", job.job_id);
    }

    let notify = JobNotify {
        webhook: "http://hooks.local/done".to_string(),
    };
    let failed = repo
        .batch_set_notify(&ids, &notify, "2021-01-01T00:00:00Z", &visitor)
        .await?;
    assert!(failed.is_empty());
    let jobs = repo.get_jobs(&by_ids(&["job-1"]), &visitor).await?;
    assert_eq!(jobs[0].context.notify.webhook, "http://hooks.local/done");
    assert_eq!(jobs[0].update_time, "2021-01-01T00:00:00Z");

    let err = repo
        .batch_set_notify(&[], &notify, "", &visitor)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    Ok(())
}

#[tokio::test]
async fn test_upsert_and_query_status() -> Result<()> {
    let (_db, repo) = setup().await?;
    let visitor = tenant_a();
    repo.create_job(&JobInfoBuilder::new().with_id("job-1").build(), &visitor)
        .await?;

    let first = JobStatusBuilder::new("exec-1", "job-1")
        .with_begin_time("2020-03-24T18:53:00Z")
        .with_executor("node-1", "2020-03-24T18:53:00Z")
        .build();
    let second = JobStatusBuilder::new("exec-2", "job-1")
        .with_begin_time("2020-03-25T18:53:00Z")
        .without_tenant()
        .build();
    let bad_status = JobStatusBuilder::new("exec-3", "job-1")
        .with_status("paused")
        .build();

    let failed = repo
        .upsert_job_status(&[first.clone(), second, bad_status], &visitor)
        .await?;
    assert_eq!(failed, ["exec-3"]);

    // 仅指定任务ID时返回最近一次执行
    let latest = repo
        .get_job_status(
            &JobStatusQueryParams {
                job_id: "job-1".to_string(),
                ..Default::default()
            },
            &visitor,
        )
        .await?;
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].execute_id, "exec-2");
    assert_eq!(latest[0].tenant_id(), Some("tenant-a"));

    let mut finished = first.clone();
    finished.status = "success".to_string();
    finished.end_time = "2020-03-24T18:54:00Z".to_string();
    assert!(repo.upsert_job_status(&[finished], &visitor).await?.is_empty());

    let succeeded = repo
        .get_job_status(
            &JobStatusQueryParams {
                job_status: "success".to_string(),
                ..Default::default()
            },
            &visitor,
        )
        .await?;
    assert_eq!(succeeded.len(), 1);
    assert_eq!(succeeded[0].execute_id, "exec-1");
    assert_eq!(succeeded[0].end_time, "2020-03-24T18:54:00Z");
    assert_eq!(succeeded[0].executor[0].executor_id, "node-1");

    let windowed = repo
        .get_job_status(
            &JobStatusQueryParams {
                begin_time: "2020-03-25T00:00:00Z".to_string(),
                end_time: "2020-03-26T00:00:00Z".to_string(),
                ..Default::default()
            },
            &visitor,
        )
        .await?;
    assert_eq!(windowed.len(), 1);
    assert_eq!(windowed[0].execute_id, "exec-2");

    let found = repo.find_status("exec-1", &visitor).await?;
    assert_eq!(found.map(|s| s.status), Some("success".to_string()));
    assert!(repo
        .find_status("exec-1", &Visitor::tenant("tenant-b"))
        .await?
        .is_none());

    Ok(())
}

#[tokio::test]
async fn test_status_query_errors() -> Result<()> {
    let (_db, repo) = setup().await?;
    let visitor = tenant_a();

    let err = repo
        .get_job_status(&JobStatusQueryParams::default(), &visitor)
        .await
        .unwrap_err();
    assert_eq!(err.cause, causes::QUERY_PARAMETER_IS_NULL);
    assert_eq!(err.detail.unwrap().fields().len(), 5);

    let err = repo
        .get_job_status(
            &JobStatusQueryParams {
                job_id: "ghost".to_string(),
                ..Default::default()
            },
            &visitor,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let err = repo
        .get_job_status(
            &JobStatusQueryParams {
                job_status: "paused".to_string(),
                ..Default::default()
            },
            &visitor,
        )
        .await
        .unwrap_err();
    assert_eq!(err.cause, causes::JOB_STATUS_ILLEGAL);

    let err = repo
        .upsert_job_status(
            &[JobStatusBuilder::new("exec-1", "job-1").with_type("weekly").build()],
            &visitor,
        )
        .await
        .unwrap_err();
    assert_eq!(err.cause, causes::STATUS_EMPTY);
    assert_eq!(err.kind, ErrorKind::Internal);

    let err = repo
        .upsert_job_status(
            &[JobStatusBuilder::new("exec-1", "job-1")
                .with_begin_time("24/03/2020")
                .build()],
            &visitor,
        )
        .await
        .unwrap_err();
    assert_eq!(err.cause, causes::TIME_ILLEGAL);

    let err = repo
        .upsert_job_status(&[JobStatusBuilder::new("exec'1", "job-1").build()], &visitor)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::BadRequest);

    Ok(())
}

#[tokio::test]
async fn test_upsert_rejects_foreign_rows() -> Result<()> {
    let (_db, repo) = setup().await?;
    let owned = JobStatusBuilder::new("exec-1", "job-1")
        .with_tenant("tenant-b")
        .build();
    repo.upsert_job_status(&[owned], &Visitor::tenant("tenant-b"))
        .await?;

    let hijack = JobStatusBuilder::new("exec-1", "job-1")
        .with_status("failure")
        .build();
    let fresh = JobStatusBuilder::new("exec-2", "job-1").build();
    let failed = repo
        .upsert_job_status(&[hijack, fresh], &tenant_a())
        .await?;
    assert_eq!(failed, ["exec-1"]);

    let kept = repo
        .find_status("exec-1", &Visitor::admin())
        .await?
        .expect("status exists");
    assert_eq!(kept.status, "executing");

    Ok(())
}

#[tokio::test]
async fn test_delete_flags_statuses() -> Result<()> {
    let (_db, repo) = setup().await?;
    let visitor = tenant_a();
    repo.create_job(&JobInfoBuilder::new().with_id("job-1").build(), &visitor)
        .await?;
    repo.upsert_job_status(
        &[
            JobStatusBuilder::new("exec-1", "job-1").build(),
            JobStatusBuilder::new("exec-2", "job-1").build(),
        ],
        &visitor,
    )
    .await?;

    repo.delete_jobs(" job-1 ,", &visitor).await?;

    assert!(repo.find_status("exec-1", &visitor).await?.is_none());
    let hidden = repo
        .find_status("exec-2", &Visitor::admin())
        .await?;
    assert!(hidden.is_none());

    // 空ID列表不做任何事
    repo.delete_jobs("", &visitor).await?;

    Ok(())
}

#[tokio::test]
async fn test_delete_rolls_back_on_flag_failure() -> Result<()> {
    let (db, repo) = setup().await?;
    let visitor = tenant_a();
    repo.create_job(&JobInfoBuilder::new().with_id("job-1").build(), &visitor)
        .await?;
    repo.upsert_job_status(&[JobStatusBuilder::new("exec-1", "job-1").build()], &visitor)
        .await?;

    sqlx::query(
        "CREATE TRIGGER block_status_update BEFORE UPDATE ON cron_job_status \
         BEGIN SELECT RAISE(ABORT, 'forced'); END;",
    )
    .execute(&db.pool())
    .await?;

    let err = repo.delete_jobs("job-1", &visitor).await.unwrap_err();
    assert_eq!(err.cause, causes::UPDATE_JOB_DELETED_FLAG);

    assert_eq!(repo.get_jobs(&by_ids(&["job-1"]), &visitor).await?.len(), 1);
    assert!(repo.find_status("exec-1", &visitor).await?.is_some());

    Ok(())
}

#[tokio::test]
async fn test_ping_and_reconnect() -> Result<()> {
    let (db, repo) = setup().await?;
    repo.ping().await?;

    db.close().await;
    let err = repo.ping().await.unwrap_err();
    assert_eq!(err.cause, causes::PING_DATABASE);

    db.reconnect().await?;
    repo.ping().await?;

    Ok(())
}
