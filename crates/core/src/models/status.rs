use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const EXT_IS_DELETED: &str = "is_deleted";
pub const EXT_TENANT_ID: &str = "tenant_id";
pub const EXT_RESULT: &str = "result";

/// 任务执行状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobStatus {
    pub execute_id: String,
    pub job_id: String,
    pub job_type: String,
    pub job_name: String,
    #[serde(rename = "job_status")]
    pub status: String,
    #[serde(rename = "begin_at")]
    pub begin_time: String,
    #[serde(rename = "end_at")]
    pub end_time: String,
    /// 执行者记录，只追加
    pub executor: Vec<ExecutorRecord>,
    pub execute_times: i64,
    pub ext_info: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorRecord {
    pub executor_id: String,
    pub executed_at: String,
}

impl JobStatus {
    pub fn is_deleted(&self) -> bool {
        match self.ext_info.get(EXT_IS_DELETED) {
            Some(Value::Number(n)) => n.as_i64() == Some(1),
            Some(Value::Bool(b)) => *b,
            _ => false,
        }
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.ext_info.get(EXT_TENANT_ID).and_then(Value::as_str)
    }

    pub fn mark_deleted(&mut self) {
        self.ext_info.insert(EXT_IS_DELETED.to_string(), Value::from(1));
    }
}
