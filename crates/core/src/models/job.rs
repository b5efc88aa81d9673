use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 任务定义
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobInfo {
    pub job_id: String,
    pub job_name: String,
    #[serde(rename = "job_cron_time")]
    pub cron_time: String,
    pub job_type: String,
    #[serde(rename = "job_context")]
    pub context: JobContext,
    pub tenant_id: String,
    pub enabled: bool,
    pub remarks: String,
    #[serde(rename = "created_at")]
    pub create_time: String,
    #[serde(rename = "updated_at")]
    pub update_time: String,
}

/// 任务执行上下文
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobContext {
    pub mode: String,
    /// URL或命令行
    pub exec: String,
    pub info: JobContextInfo,
    pub notify: JobNotify,
    #[serde(rename = "begin_at")]
    pub begin_time: String,
    #[serde(rename = "end_at")]
    pub end_time: String,
    pub execute_id: String,
}

/// 任务完成通知
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobNotify {
    pub webhook: String,
}

/// 请求信息
///
/// `params`/`headers` 缺省与空映射是两种不同的值。
/// 分发描述在反序列化时确定：`kubernetes` 为非空对象时解析为容器任务，否则 `body` 作为原始负载。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "JobContextInfoWire", into = "JobContextInfoWire")]
pub struct JobContextInfo {
    pub method: String,
    pub params: Option<BTreeMap<String, String>>,
    pub headers: Option<BTreeMap<String, String>>,
    pub profile: DispatchProfile,
}

impl JobContextInfo {
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
    }
}

/// 分发描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DispatchProfile {
    /// 原样转发的负载
    Raw(Map<String, Value>),
    /// 交给容器任务执行器的任务描述
    ContainerJob(ContainerJobSpec),
}

impl Default for DispatchProfile {
    fn default() -> Self {
        DispatchProfile::Raw(Map::new())
    }
}

/// 容器任务描述
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerJobSpec {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// 其余字段原样保留
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct JobContextInfoWire {
    #[serde(default)]
    method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    params: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kubernetes: Option<Map<String, Value>>,
}

impl TryFrom<JobContextInfoWire> for JobContextInfo {
    type Error = serde_json::Error;

    fn try_from(wire: JobContextInfoWire) -> Result<Self, Self::Error> {
        let profile = match wire.kubernetes {
            Some(spec) if !spec.is_empty() => {
                DispatchProfile::ContainerJob(serde_json::from_value(Value::Object(spec))?)
            }
            _ => DispatchProfile::Raw(wire.body.unwrap_or_default()),
        };

        Ok(Self {
            method: wire.method,
            params: wire.params,
            headers: wire.headers,
            profile,
        })
    }
}

impl From<JobContextInfo> for JobContextInfoWire {
    fn from(info: JobContextInfo) -> Self {
        let (body, kubernetes) = match info.profile {
            DispatchProfile::Raw(body) if body.is_empty() => (None, None),
            DispatchProfile::Raw(body) => (Some(body), None),
            DispatchProfile::ContainerJob(spec) => {
                let spec = match serde_json::to_value(spec) {
                    Ok(Value::Object(map)) => map,
                    _ => Map::new(),
                };
                (None, Some(spec))
            }
        };

        Self {
            method: info.method,
            params: info.params,
            headers: info.headers,
            body,
            kubernetes,
        }
    }
}
