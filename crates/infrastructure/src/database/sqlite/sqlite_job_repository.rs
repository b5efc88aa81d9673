use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use cron::Schedule;
use cronhub_core::{
    dictionary::EnumDictionary,
    errors::causes,
    models::{
        split_ids, JobContext, JobInfo, JobInfoQueryParams, JobNotify, JobStatus,
        JobStatusQueryParams, JobTotal, JobTotalQueryParams, Visitor, EXT_IS_DELETED,
        EXT_TENANT_ID,
    },
    time::{is_illegal_time, now_timestamp, string_to_timestamp, timestamp_to_string},
    traits::JobRepository,
    CronError, CronResult,
};
use serde_json::{Map, Value};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite};
use tracing::{debug, error, instrument, warn};

use crate::database::{
    manager::DatabaseManager,
    query_builder::{
        is_parameter_inject, multi_row_values, placeholders, QueryBuilder, SqlParam,
        ID_CHUNK_SIZE,
    },
};

const JOB_COLUMNS: &str = "job_id, job_name, cron_time, job_type, job_context, tenant_id, enabled, remarks, created_at, updated_at";
const STATUS_COLUMNS: &str = "execute_id, job_id, job_type, job_name, job_status, begin_at, end_at, executor, execute_times, ext_info";

/// 写入前校验通过的任务字段
struct PreparedJob {
    context: String,
    create_time: i64,
    update_time: i64,
    job_type: i64,
}

/// 写入前校验通过的执行状态
struct PreparedStatus {
    execute_id: String,
    job_id: String,
    job_type: i64,
    job_name: String,
    job_status: i64,
    begin_at: i64,
    end_at: i64,
    executor: String,
    execute_times: i64,
    ext_info: String,
}

/// 基于SQLite的任务存储
pub struct SqliteJobRepository {
    db: Arc<DatabaseManager>,
    dictionary: Arc<EnumDictionary>,
    id_chunk_size: usize,
}

impl SqliteJobRepository {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self {
            db,
            dictionary: EnumDictionary::shared(),
            id_chunk_size: ID_CHUNK_SIZE,
        }
    }

    pub fn with_dictionary(mut self, dictionary: Arc<EnumDictionary>) -> Self {
        self.dictionary = dictionary;
        self
    }

    /// 存在性查询的分批大小，取值范围 1..=10
    pub fn with_id_chunk_size(mut self, size: usize) -> Self {
        self.id_chunk_size = size.clamp(1, ID_CHUNK_SIZE);
        self
    }

    fn tenant_scope(visitor: &Visitor) -> Option<&str> {
        if visitor.admin {
            None
        } else {
            Some(visitor.client_id.as_str())
        }
    }

    fn check_inject(params: &[(&str, &str)], operation: &str) -> CronResult<()> {
        if let Some(key) = is_parameter_inject(params) {
            error!("{} 参数含有注入特征: {}", operation, key);
            return Err(CronError::bad_request_params(
                causes::INVALID_PARAMETER,
                &[key.as_str()],
            ));
        }
        Ok(())
    }

    fn check_time(key: &str, value: &str) -> CronResult<()> {
        if is_illegal_time(value) {
            return Err(CronError::bad_request_params(causes::TIME_ILLEGAL, &[key]));
        }
        Ok(())
    }

    fn check_time_interval(begin_time: &str, end_time: &str) -> CronResult<()> {
        Self::check_time("begin_at", begin_time)?;
        Self::check_time("end_at", end_time)?;

        let begin = string_to_timestamp(begin_time).unwrap_or(0);
        let end = string_to_timestamp(end_time).unwrap_or(0);
        if !begin_time.is_empty() && !end_time.is_empty() && begin > end {
            return Err(CronError::bad_request_params(
                causes::BEGIN_TIME_GREATER_THAN_END_TIME,
                &["begin_at", "end_at"],
            ));
        }
        Ok(())
    }

    /// 6段（含秒）cron表达式或 `@hourly` 一类的描述符
    fn check_cron_time(cron_time: &str) -> CronResult<()> {
        let trimmed = cron_time.trim();
        let shape_ok = trimmed.starts_with('@') || trimmed.split_whitespace().count() == 6;
        if !shape_ok || Schedule::from_str(trimmed).is_err() {
            return Err(CronError::bad_request_params(
                causes::CRON_TIME,
                &["job_cron_time"],
            ));
        }
        Ok(())
    }

    fn check_job_type(&self, job_type: &str) -> CronResult<i64> {
        self.dictionary
            .job_type
            .string_to_int(job_type)
            .ok_or_else(|| CronError::bad_request_params(causes::JOB_TYPE_ILLEGAL, &["job_type"]))
    }

    fn check_job_status(&self, job_status: &str) -> CronResult<i64> {
        self.dictionary
            .job_status
            .string_to_int(job_status)
            .ok_or_else(|| {
                CronError::bad_request_params(causes::JOB_STATUS_ILLEGAL, &["job_status"])
            })
    }

    fn marshal<T: serde::Serialize>(value: &T, operation: &str) -> CronResult<String> {
        serde_json::to_string(value).map_err(|e| {
            error!("{} 序列化失败: {}", operation, e);
            CronError::internal(causes::MARSHAL_JSON)
        })
    }

    fn unmarshal<T: serde::de::DeserializeOwned>(raw: &str, operation: &str) -> CronResult<T> {
        serde_json::from_str(raw).map_err(|e| {
            error!("{} 反序列化失败: {}", operation, e);
            CronError::internal(causes::UNMARSHAL_JSON)
        })
    }

    fn parse_or_zero(value: &str, operation: &str) -> i64 {
        string_to_timestamp(value).unwrap_or_else(|e| {
            warn!("{} 时间格式错误 {}: {}", operation, value, e);
            0
        })
    }

    fn check_write_fields(&self, job: &JobInfo, operation: &str) -> CronResult<()> {
        Self::check_inject(
            &[
                ("job_id", job.job_id.as_str()),
                ("job_name", job.job_name.as_str()),
                ("job_cron_time", job.cron_time.as_str()),
                ("remarks", job.remarks.as_str()),
            ],
            operation,
        )?;

        if job.job_name.is_empty() {
            return Err(CronError::bad_request_params(
                causes::JOB_NAME_EMPTY,
                &["job_name"],
            ));
        }

        Self::check_time_interval(&job.context.begin_time, &job.context.end_time)?;
        self.check_execution_mode(&job.context.mode)?;
        Self::check_cron_time(&job.cron_time)
    }

    fn check_insert_before(&self, job: &JobInfo) -> CronResult<PreparedJob> {
        self.check_write_fields(job, "create_job")?;
        let context = Self::marshal(&job.context, "create_job")?;
        let create_time = Self::parse_or_zero(&job.create_time, "create_job");
        let update_time = Self::parse_or_zero(&job.update_time, "create_job");
        let job_type = self.check_job_type(&job.job_type)?;

        Ok(PreparedJob {
            context,
            create_time,
            update_time,
            job_type,
        })
    }

    async fn check_update_before(&self, job: &JobInfo, visitor: &Visitor) -> CronResult<PreparedJob> {
        self.check_write_fields(job, "update_job")?;
        self.check_single_job_id_exist(&job.job_id, visitor).await?;
        let context = Self::marshal(&job.context, "update_job")?;
        let update_time = Self::parse_or_zero(&job.update_time, "update_job");
        let job_type = self.check_job_type(&job.job_type)?;

        Ok(PreparedJob {
            context,
            create_time: 0,
            update_time,
            job_type,
        })
    }

    /// 写入失败后区分名称冲突与其他错误
    async fn check_write_after(&self, job: &JobInfo, visitor: &Visitor, original: CronError) -> CronError {
        let tenant = if job.tenant_id.is_empty() {
            visitor.client_id.as_str()
        } else {
            job.tenant_id.as_str()
        };

        let count = sqlx::query(
            "SELECT COUNT(*) FROM cron_jobs WHERE job_name = ? AND tenant_id = ? AND job_id != ?",
        )
        .bind(job.job_name.as_str())
        .bind(tenant)
        .bind(job.job_id.as_str())
        .fetch_one(&self.db.pool())
        .await
        .and_then(|row| row.try_get::<i64, _>(0));

        match count {
            Ok(n) if n > 0 => CronError::conflict(causes::JOB_NAME_EXISTS, &["job_name"]),
            Ok(_) => original,
            Err(e) => {
                error!("查询任务名称失败: {}", e);
                CronError::internal(causes::QUERY_JOB_NAME)
            }
        }
    }

    /// 返回不存在（或不属于访问者租户）的任务ID，按批查询
    pub async fn missing_job_ids(&self, job_ids: &[String], visitor: &Visitor) -> CronResult<Vec<String>> {
        let mut missing = Vec::new();
        for chunk in job_ids.chunks(self.id_chunk_size) {
            let mut builder = QueryBuilder::new();
            builder
                .add_condition("job_id", "IN", chunk.to_vec())
                .add_tenant("tenant_id", Self::tenant_scope(visitor));
            let (condition, args) = builder.build();
            let sql = format!("SELECT job_id FROM cron_jobs{condition}");

            let rows = bind_params(sqlx::query(&sql), &args)
                .fetch_all(&self.db.pool())
                .await
                .map_err(|e| {
                    error!("查询任务ID失败: {}", e);
                    CronError::internal(causes::QUERY_JOB_ID)
                })?;

            let mut found = Vec::with_capacity(rows.len());
            for row in &rows {
                found.push(scan::<String>(row, "job_id")?);
            }
            missing.extend(chunk.iter().filter(|id| !found.contains(id)).cloned());
        }
        Ok(missing)
    }

    async fn check_single_job_id_exist(&self, job_id: &str, visitor: &Visitor) -> CronResult<()> {
        if job_id.is_empty() {
            return Err(CronError::not_found(causes::JOB_NOT_EXIST, &["job_id"]));
        }
        let missing = self.missing_job_ids(&[job_id.to_string()], visitor).await?;
        if !missing.is_empty() {
            return Err(CronError::not_found(causes::JOB_NOT_EXIST, &["job_id"]));
        }
        Ok(())
    }

    async fn check_batch_before(&self, job_ids: &[String], visitor: &Visitor) -> CronResult<()> {
        Self::check_inject(&[("job_id", job_ids.join(",").as_str())], "batch")?;
        if job_ids.is_empty() || !self.missing_job_ids(job_ids, visitor).await?.is_empty() {
            return Err(CronError::not_found(causes::JOB_NOT_EXIST, &["job_id"]));
        }
        Ok(())
    }

    fn row_to_job(&self, row: &SqliteRow) -> CronResult<JobInfo> {
        let job_type: i64 = scan(row, "job_type")?;
        let context: String = scan(row, "job_context")?;
        let enabled: i64 = scan(row, "enabled")?;

        Ok(JobInfo {
            job_id: scan(row, "job_id")?,
            job_name: scan(row, "job_name")?,
            cron_time: scan(row, "cron_time")?,
            job_type: self
                .dictionary
                .job_type
                .int_to_string(job_type)
                .unwrap_or_default()
                .to_string(),
            context: Self::unmarshal::<JobContext>(&context, "get_jobs")?,
            tenant_id: scan(row, "tenant_id")?,
            enabled: enabled != 0,
            remarks: scan(row, "remarks")?,
            create_time: timestamp_to_string(scan(row, "created_at")?),
            update_time: timestamp_to_string(scan(row, "updated_at")?),
        })
    }

    fn row_to_status(&self, row: &SqliteRow) -> CronResult<JobStatus> {
        let job_type: i64 = scan(row, "job_type")?;
        let job_status: i64 = scan(row, "job_status")?;
        let executor: String = scan(row, "executor")?;
        let ext_info: String = scan(row, "ext_info")?;

        Ok(JobStatus {
            execute_id: scan(row, "execute_id")?,
            job_id: scan(row, "job_id")?,
            job_type: self
                .dictionary
                .job_type
                .int_to_string(job_type)
                .unwrap_or_default()
                .to_string(),
            job_name: scan(row, "job_name")?,
            status: self
                .dictionary
                .job_status
                .int_to_string(job_status)
                .unwrap_or_default()
                .to_string(),
            begin_time: timestamp_to_string(scan(row, "begin_at")?),
            end_time: timestamp_to_string(scan(row, "end_at")?),
            executor: Self::unmarshal(&executor, "get_job_status")?,
            execute_times: scan(row, "execute_times")?,
            ext_info: Self::unmarshal(&ext_info, "get_job_status")?,
        })
    }

    /// 已删除、无租户或属于其他租户的记录对访问者不可见
    fn is_status_visible(status: &JobStatus, visitor: &Visitor) -> bool {
        if status.is_deleted() {
            return false;
        }
        match status.tenant_id() {
            Some(tenant) => visitor.can_access(tenant),
            None => {
                debug!("执行记录缺少租户: {}", status.execute_id);
                false
            }
        }
    }

    /// 校验待写入的执行状态，类型或状态非法的记录计入失败列表
    fn clear_job_status(
        &self,
        statuses: &[JobStatus],
        visitor: &Visitor,
        failed: &mut Vec<String>,
    ) -> CronResult<Vec<PreparedStatus>> {
        let mut prepared: Vec<PreparedStatus> = Vec::with_capacity(statuses.len());

        for status in statuses {
            Self::check_inject(
                &[
                    ("execute_id", status.execute_id.as_str()),
                    ("job_id", status.job_id.as_str()),
                    ("job_name", status.job_name.as_str()),
                ],
                "upsert_job_status",
            )?;

            let executor = Self::marshal(&status.executor, "upsert_job_status")?;
            let mut ext_info = status.ext_info.clone();
            if !visitor.admin && !ext_info.contains_key(EXT_TENANT_ID) {
                ext_info.insert(
                    EXT_TENANT_ID.to_string(),
                    Value::String(visitor.client_id.clone()),
                );
            }
            let ext_info = Self::marshal(&ext_info, "upsert_job_status")?;

            let (begin_at, end_at) = match (
                string_to_timestamp(&status.begin_time),
                string_to_timestamp(&status.end_time),
            ) {
                (Ok(begin), Ok(end)) => (begin, end),
                _ => {
                    error!("执行状态时间格式错误: {:?}", status);
                    return Err(CronError::internal(causes::TIME_ILLEGAL));
                }
            };

            let (job_type, job_status) = match (
                self.check_job_type(&status.job_type),
                self.check_job_status(&status.status),
            ) {
                (Ok(t), Ok(s)) => (t, s),
                _ => {
                    warn!("执行状态类型或状态非法，跳过: {}", status.execute_id);
                    failed.push(status.execute_id.clone());
                    continue;
                }
            };

            let row = PreparedStatus {
                execute_id: status.execute_id.clone(),
                job_id: status.job_id.clone(),
                job_type,
                job_name: status.job_name.clone(),
                job_status,
                begin_at,
                end_at,
                executor,
                execute_times: status.execute_times,
                ext_info,
            };

            match prepared.iter().position(|p| p.execute_id == row.execute_id) {
                Some(pos) => prepared[pos] = row,
                None => prepared.push(row),
            }
        }

        if prepared.is_empty() {
            return Err(CronError::internal(causes::STATUS_EMPTY));
        }
        Ok(prepared)
    }
}

fn bind_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [SqlParam],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlParam::Int(value) => query.bind(*value),
            SqlParam::Text(value) => query.bind(value.as_str()),
        };
    }
    query
}

fn scan<T>(row: &SqliteRow, column: &str) -> CronResult<T>
where
    T: for<'r> sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(column).map_err(|e| {
        error!("读取字段 {} 失败: {}", column, e);
        CronError::internal(causes::SCAN_FIELD_VALUE)
    })
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    #[instrument(skip(self, job, visitor), fields(job_id = %job.job_id))]
    async fn create_job(&self, job: &JobInfo, visitor: &Visitor) -> CronResult<()> {
        let prepared = self.check_insert_before(job)?;

        let result = sqlx::query(&format!(
            "INSERT INTO cron_jobs ({JOB_COLUMNS}) VALUES ({})",
            placeholders(10)
        ))
        .bind(job.job_id.as_str())
        .bind(job.job_name.as_str())
        .bind(job.cron_time.as_str())
        .bind(prepared.job_type)
        .bind(prepared.context.as_str())
        .bind(job.tenant_id.as_str())
        .bind(job.enabled)
        .bind(job.remarks.as_str())
        .bind(prepared.create_time)
        .bind(prepared.update_time)
        .execute(&self.db.pool())
        .await;

        if let Err(e) = result {
            error!("新增任务失败: {}", e);
            return Err(self
                .check_write_after(job, visitor, CronError::internal(causes::INSERT_JOB))
                .await);
        }

        debug!("任务已创建: {}", job.job_name);
        Ok(())
    }

    #[instrument(skip(self, job, visitor), fields(job_id = %job.job_id))]
    async fn update_job(&self, job: &JobInfo, visitor: &Visitor) -> CronResult<()> {
        let prepared = self.check_update_before(job, visitor).await?;

        let mut builder = QueryBuilder::new();
        builder
            .add_condition("job_id", "=", job.job_id.as_str())
            .add_tenant("tenant_id", Self::tenant_scope(visitor));
        let (condition, args) = builder.build();
        let sql = format!(
            "UPDATE cron_jobs SET job_name = ?, cron_time = ?, job_type = ?, job_context = ?, enabled = ?, remarks = ?, updated_at = ?{condition}"
        );

        let query = sqlx::query(&sql)
            .bind(job.job_name.as_str())
            .bind(job.cron_time.as_str())
            .bind(prepared.job_type)
            .bind(prepared.context.as_str())
            .bind(job.enabled)
            .bind(job.remarks.as_str())
            .bind(prepared.update_time);

        if let Err(e) = bind_params(query, &args).execute(&self.db.pool()).await {
            error!("更新任务失败: {}", e);
            return Err(self
                .check_write_after(job, visitor, CronError::internal(causes::UPDATE_JOB))
                .await);
        }

        debug!("任务已更新: {}", job.job_id);
        Ok(())
    }

    #[instrument(skip(self, visitor))]
    async fn delete_jobs(&self, job_ids: &str, visitor: &Visitor) -> CronResult<()> {
        Self::check_inject(&[("job_id", job_ids)], "delete_jobs")?;

        let ids = split_ids(job_ids);
        if ids.is_empty() {
            return Ok(());
        }

        let pool = self.db.pool();
        let mut tx = pool.begin().await.map_err(|e| {
            error!("开启事务失败: {}", e);
            CronError::internal(causes::TRANSACTION_BEGIN)
        })?;

        // 在事务内读取执行记录，未提交的事务在出错返回时随 drop 回滚
        let status_sql = format!(
            "SELECT execute_id, ext_info FROM cron_job_status WHERE job_id IN ({})",
            placeholders(ids.len())
        );
        let mut status_query = sqlx::query(&status_sql);
        for id in &ids {
            status_query = status_query.bind(id.as_str());
        }
        let status_rows = status_query.fetch_all(&mut *tx).await.map_err(|e| {
            error!("查询待删除任务的执行记录失败: {}", e);
            CronError::internal(causes::QUERY_JOB)
        })?;

        let mut flagged = Vec::new();
        for row in &status_rows {
            let execute_id: String = scan(row, "execute_id")?;
            let raw: String = scan(row, "ext_info")?;
            let mut ext_info: Map<String, Value> = Self::unmarshal(&raw, "delete_jobs")?;

            let owned = ext_info
                .get(EXT_TENANT_ID)
                .and_then(Value::as_str)
                .is_some_and(|tenant| visitor.can_access(tenant));
            if !owned {
                continue;
            }

            ext_info.insert(EXT_IS_DELETED.to_string(), Value::from(1));
            flagged.push((execute_id, Self::marshal(&ext_info, "delete_jobs")?));
        }

        let mut builder = QueryBuilder::new();
        builder
            .add_condition("job_id", "IN", ids)
            .add_tenant("tenant_id", Self::tenant_scope(visitor));
        let (condition, args) = builder.build();
        let delete_sql = format!("DELETE FROM cron_jobs{condition}");

        if let Err(e) = bind_params(sqlx::query(&delete_sql), &args)
            .execute(&mut *tx)
            .await
        {
            error!("删除任务失败: {}", e);
            if let Err(e) = tx.rollback().await {
                warn!("回滚失败: {}", e);
            }
            return Err(CronError::internal(causes::DELETE_JOB));
        }

        for (execute_id, ext_info) in &flagged {
            let result = sqlx::query("UPDATE cron_job_status SET ext_info = ? WHERE execute_id = ?")
                .bind(ext_info.as_str())
                .bind(execute_id.as_str())
                .execute(&mut *tx)
                .await;
            if let Err(e) = result {
                error!("标记执行记录删除失败 {}: {}", execute_id, e);
                if let Err(e) = tx.rollback().await {
                    warn!("回滚失败: {}", e);
                }
                return Err(CronError::internal(causes::UPDATE_JOB_DELETED_FLAG));
            }
        }

        tx.commit().await.map_err(|e| {
            error!("提交事务失败: {}", e);
            CronError::internal(causes::COMMIT)
        })?;

        debug!("任务已删除: {}, 标记执行记录 {} 条", job_ids, flagged.len());
        Ok(())
    }

    #[instrument(skip(self, params, visitor))]
    async fn get_jobs(&self, params: &JobInfoQueryParams, visitor: &Visitor) -> CronResult<Vec<JobInfo>> {
        Self::check_inject(&[("job_id", params.job_id.join(",").as_str())], "get_jobs")?;

        let mut builder = QueryBuilder::new();
        if params.job_id.is_empty() {
            if params.page < 1 || params.limit < 0 {
                return Err(CronError::bad_request_params(
                    causes::LIMIT_OR_PAGE_ILLEGAL,
                    &["page", "limit"],
                ));
            }
            Self::check_time("timestamp", &params.timestamp)?;
            let job_type = if params.job_type.is_empty() {
                0
            } else {
                self.check_job_type(&params.job_type)?
            };

            builder
                .add_condition("job_type", "=", job_type)
                .add_condition(
                    "created_at",
                    "<=",
                    string_to_timestamp(&params.timestamp).unwrap_or(0),
                )
                .add_tenant("tenant_id", Self::tenant_scope(visitor))
                .add_order_by("created_at", true)
                .add_limit(params.limit, params.page);
        } else {
            // 指定ID时忽略其他条件
            builder
                .add_condition("job_id", "IN", params.job_id.clone())
                .add_tenant("tenant_id", Self::tenant_scope(visitor));
        }

        let (condition, args) = builder.build();
        let sql = format!("SELECT {JOB_COLUMNS} FROM cron_jobs{condition}");
        let rows = bind_params(sqlx::query(&sql), &args)
            .fetch_all(&self.db.pool())
            .await
            .map_err(|e| {
                error!("查询任务失败: {}", e);
                CronError::internal(causes::QUERY_JOB)
            })?;

        let jobs = rows
            .iter()
            .map(|row| self.row_to_job(row))
            .collect::<CronResult<Vec<_>>>()?;

        if params
            .job_id
            .iter()
            .any(|id| !jobs.iter().any(|job| &job.job_id == id))
        {
            return Err(CronError::not_found(causes::JOB_NOT_EXIST, &["job_id"]));
        }

        Ok(jobs)
    }

    #[instrument(skip(self, params, visitor))]
    async fn get_job_total(&self, params: &JobTotalQueryParams, visitor: &Visitor) -> CronResult<JobTotal> {
        Self::check_time_interval(&params.begin_time, &params.end_time)?;

        let now = now_timestamp();
        let mut builder = QueryBuilder::new();
        builder
            .add_condition(
                "created_at",
                ">=",
                string_to_timestamp(&params.begin_time).unwrap_or(0),
            )
            .add_condition(
                "created_at",
                "<=",
                string_to_timestamp(&params.end_time).unwrap_or(0),
            )
            .add_condition("created_at", "<=", now)
            .add_tenant("tenant_id", Self::tenant_scope(visitor));
        let (condition, args) = builder.build();
        let sql = format!("SELECT COUNT(*) AS total FROM cron_jobs{condition}");

        let row = bind_params(sqlx::query(&sql), &args)
            .fetch_one(&self.db.pool())
            .await
            .map_err(|e| {
                error!("查询任务总数失败: {}", e);
                CronError::internal(causes::QUERY_JOB_TOTAL)
            })?;

        Ok(JobTotal {
            total: scan(&row, "total")?,
            timestamp: timestamp_to_string(now),
        })
    }

    #[instrument(skip(self, params, visitor))]
    async fn get_job_status(
        &self,
        params: &JobStatusQueryParams,
        visitor: &Visitor,
    ) -> CronResult<Vec<JobStatus>> {
        Self::check_inject(&[("job_id", params.job_id.as_str())], "get_job_status")?;

        if params.is_empty() {
            return Err(CronError::bad_request_params(
                causes::QUERY_PARAMETER_IS_NULL,
                &["job_id", "job_type", "job_status", "begin_at", "end_at"],
            ));
        }
        Self::check_time_interval(&params.begin_time, &params.end_time)?;
        if !params.job_id.is_empty() {
            self.check_single_job_id_exist(&params.job_id, visitor).await?;
        }
        let job_type = if params.job_type.is_empty() {
            0
        } else {
            self.check_job_type(&params.job_type)?
        };
        let job_status = if params.job_status.is_empty() {
            0
        } else {
            self.check_job_status(&params.job_status)?
        };

        let mut builder = QueryBuilder::new();
        builder
            .add_condition("job_id", "=", params.job_id.as_str())
            .add_condition(
                "begin_at",
                ">=",
                string_to_timestamp(&params.begin_time).unwrap_or(0),
            )
            .add_condition(
                "begin_at",
                "<=",
                string_to_timestamp(&params.end_time).unwrap_or(0),
            )
            .add_condition("job_type", "=", job_type)
            .add_condition("job_status", "=", job_status)
            .add_order_by("begin_at", true);
        if params.only_job_id() {
            builder.add_limit(1, 1);
        }

        let (condition, args) = builder.build();
        let sql = format!("SELECT {STATUS_COLUMNS} FROM cron_job_status{condition}");
        let rows = bind_params(sqlx::query(&sql), &args)
            .fetch_all(&self.db.pool())
            .await
            .map_err(|e| {
                error!("查询执行状态失败: {}", e);
                CronError::internal(causes::QUERY_JOB_STATUS)
            })?;

        let mut statuses = Vec::with_capacity(rows.len());
        for row in &rows {
            let status = self.row_to_status(row)?;
            if Self::is_status_visible(&status, visitor) {
                statuses.push(status);
            }
        }
        Ok(statuses)
    }

    #[instrument(skip(self, visitor))]
    async fn find_status(&self, execute_id: &str, visitor: &Visitor) -> CronResult<Option<JobStatus>> {
        Self::check_inject(&[("execute_id", execute_id)], "find_status")?;
        if execute_id.is_empty() {
            return Ok(None);
        }

        let row = sqlx::query(&format!(
            "SELECT {STATUS_COLUMNS} FROM cron_job_status WHERE execute_id = ?"
        ))
        .bind(execute_id)
        .fetch_optional(&self.db.pool())
        .await
        .map_err(|e| {
            error!("查询执行状态失败: {}", e);
            CronError::internal(causes::QUERY_JOB_STATUS)
        })?;

        match row {
            Some(row) => {
                let status = self.row_to_status(&row)?;
                Ok(Self::is_status_visible(&status, visitor).then_some(status))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, statuses, visitor), fields(count = statuses.len()))]
    async fn upsert_job_status(&self, statuses: &[JobStatus], visitor: &Visitor) -> CronResult<Vec<String>> {
        let mut failed = Vec::new();
        let prepared = self.clear_job_status(statuses, visitor, &mut failed)?;
        let pool = self.db.pool();

        let mut inserts = Vec::new();
        for row in &prepared {
            let existing = sqlx::query("SELECT ext_info FROM cron_job_status WHERE execute_id = ?")
                .bind(row.execute_id.as_str())
                .fetch_optional(&pool)
                .await;

            let existing = match existing {
                Ok(existing) => existing,
                Err(e) => {
                    error!("查询执行状态失败 {}: {}", row.execute_id, e);
                    failed.push(row.execute_id.clone());
                    continue;
                }
            };

            let Some(existing) = existing else {
                inserts.push(row);
                continue;
            };

            if !visitor.admin {
                let raw: String = scan(&existing, "ext_info")?;
                let ext_info: Map<String, Value> = Self::unmarshal(&raw, "upsert_job_status")?;
                let foreign = ext_info
                    .get(EXT_TENANT_ID)
                    .and_then(Value::as_str)
                    .is_some_and(|tenant| tenant != visitor.client_id);
                if foreign {
                    warn!("执行记录属于其他租户: {}", row.execute_id);
                    failed.push(row.execute_id.clone());
                    continue;
                }
            }

            let result = sqlx::query(
                "UPDATE cron_job_status SET job_id = ?, job_type = ?, job_name = ?, job_status = ?, begin_at = ?, end_at = ?, executor = ?, execute_times = ?, ext_info = ? WHERE execute_id = ?",
            )
            .bind(row.job_id.as_str())
            .bind(row.job_type)
            .bind(row.job_name.as_str())
            .bind(row.job_status)
            .bind(row.begin_at)
            .bind(row.end_at)
            .bind(row.executor.as_str())
            .bind(row.execute_times)
            .bind(row.ext_info.as_str())
            .bind(row.execute_id.as_str())
            .execute(&pool)
            .await;

            if let Err(e) = result {
                error!("更新执行状态失败 {}: {}", row.execute_id, e);
                failed.push(row.execute_id.clone());
            }
        }

        if inserts.is_empty() {
            return Ok(failed);
        }

        let sql = format!(
            "INSERT INTO cron_job_status ({STATUS_COLUMNS}) VALUES {}",
            multi_row_values(inserts.len(), 10)
        );
        let mut query = sqlx::query(&sql);
        for row in &inserts {
            query = query
                .bind(row.execute_id.as_str())
                .bind(row.job_id.as_str())
                .bind(row.job_type)
                .bind(row.job_name.as_str())
                .bind(row.job_status)
                .bind(row.begin_at)
                .bind(row.end_at)
                .bind(row.executor.as_str())
                .bind(row.execute_times)
                .bind(row.ext_info.as_str());
        }

        if let Err(e) = query.execute(&pool).await {
            error!("写入执行状态失败: {}", e);
            if inserts.len() == prepared.len() {
                return Err(CronError::internal(causes::UPDATE_JOB_STATUS));
            }
            failed.extend(inserts.iter().map(|row| row.execute_id.clone()));
        }

        Ok(failed)
    }

    #[instrument(skip(self, job_ids, visitor), fields(count = job_ids.len()))]
    async fn batch_set_enabled(
        &self,
        job_ids: &[String],
        enabled: bool,
        update_time: &str,
        visitor: &Visitor,
    ) -> CronResult<()> {
        self.check_batch_before(job_ids, visitor).await?;
        let update_time = Self::parse_or_zero(update_time, "batch_set_enabled");

        let mut builder = QueryBuilder::new();
        builder
            .add_condition("job_id", "IN", job_ids.to_vec())
            .add_tenant("tenant_id", Self::tenant_scope(visitor));
        let (condition, args) = builder.build();
        let sql = format!("UPDATE cron_jobs SET enabled = ?, updated_at = ?{condition}");

        let query = sqlx::query(&sql).bind(enabled).bind(update_time);
        bind_params(query, &args)
            .execute(&self.db.pool())
            .await
            .map_err(|e| {
                error!("批量启停任务失败: {}", e);
                CronError::internal(causes::BATCH_JOB_ENABLE)
            })?;
        Ok(())
    }

    #[instrument(skip(self, job_ids, notify, visitor), fields(count = job_ids.len()))]
    async fn batch_set_notify(
        &self,
        job_ids: &[String],
        notify: &JobNotify,
        update_time: &str,
        visitor: &Visitor,
    ) -> CronResult<Vec<String>> {
        self.check_batch_before(job_ids, visitor).await?;
        let update_time = Self::parse_or_zero(update_time, "batch_set_notify");
        let pool = self.db.pool();

        let sql = format!(
            "SELECT job_id, tenant_id, job_context FROM cron_jobs WHERE job_id IN ({})",
            placeholders(job_ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in job_ids {
            query = query.bind(id.as_str());
        }
        let rows = query.fetch_all(&pool).await.map_err(|e| {
            error!("查询任务上下文失败: {}", e);
            CronError::internal(causes::QUERY_JOB)
        })?;

        let mut failed = Vec::new();
        for row in &rows {
            let job_id: String = scan(row, "job_id")?;
            let tenant_id: String = scan(row, "tenant_id")?;
            if !visitor.can_access(&tenant_id) {
                continue;
            }

            let raw: String = scan(row, "job_context")?;
            let mut context: JobContext = Self::unmarshal(&raw, "batch_set_notify")?;
            context.notify = notify.clone();

            let context = match Self::marshal(&context, "batch_set_notify") {
                Ok(context) => context,
                Err(_) => {
                    failed.push(job_id);
                    continue;
                }
            };

            let result =
                sqlx::query("UPDATE cron_jobs SET job_context = ?, updated_at = ? WHERE job_id = ?")
                    .bind(context.as_str())
                    .bind(update_time)
                    .bind(job_id.as_str())
                    .execute(&pool)
                    .await;
            if let Err(e) = result {
                error!("修改任务通知地址失败 {}: {}", job_id, e);
                failed.push(job_id);
            }
        }

        Ok(failed)
    }

    fn check_execution_mode(&self, mode: &str) -> CronResult<()> {
        self.dictionary
            .execution_mode
            .string_to_int(mode)
            .map(|_| ())
            .ok_or_else(|| {
                CronError::bad_request_params(causes::UNSUPPORTED_EXECUTION_MODE, &["mode"])
            })
    }

    async fn ping(&self) -> CronResult<()> {
        self.db.ping().await
    }
}
