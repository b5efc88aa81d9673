use serde::{Deserialize, Serialize};

/// 拆分逗号分隔的任务ID，忽略空项
pub fn split_ids(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// 任务查询条件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobInfoQueryParams {
    pub job_id: Vec<String>,
    pub job_type: String,
    pub limit: i64,
    pub page: i64,
    pub timestamp: String,
}

/// 执行状态查询条件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobStatusQueryParams {
    pub job_id: String,
    pub job_type: String,
    pub job_status: String,
    #[serde(rename = "begin_at")]
    pub begin_time: String,
    #[serde(rename = "end_at")]
    pub end_time: String,
}

impl JobStatusQueryParams {
    pub fn is_empty(&self) -> bool {
        self.job_id.is_empty()
            && self.job_type.is_empty()
            && self.job_status.is_empty()
            && self.begin_time.is_empty()
            && self.end_time.is_empty()
    }

    /// 仅指定任务ID时只返回最近一次执行
    pub fn only_job_id(&self) -> bool {
        !self.job_id.is_empty()
            && self.job_type.is_empty()
            && self.job_status.is_empty()
            && self.begin_time.is_empty()
            && self.end_time.is_empty()
    }
}

/// 任务总数查询条件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobTotalQueryParams {
    #[serde(rename = "begin_at")]
    pub begin_time: String,
    #[serde(rename = "end_at")]
    pub end_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobTotal {
    pub total: i64,
    pub timestamp: String,
}
