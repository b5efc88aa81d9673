use serde::{Deserialize, Serialize};

use super::JobInfo;
use crate::dictionary::{
    OPERATION_CREATE, OPERATION_DELETE, OPERATION_ENABLE, OPERATION_NOTIFY, OPERATION_UPDATE,
};

/// 任务变更操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobOperation {
    Create,
    Update,
    Delete,
    Enable,
    Notify,
}

impl JobOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            JobOperation::Create => OPERATION_CREATE,
            JobOperation::Update => OPERATION_UPDATE,
            JobOperation::Delete => OPERATION_DELETE,
            JobOperation::Enable => OPERATION_ENABLE,
            JobOperation::Notify => OPERATION_NOTIFY,
        }
    }
}

/// 任务生命周期消息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobMsg {
    pub method: String,
    pub data: JobInfo,
}

impl JobMsg {
    pub fn new(operation: JobOperation, data: JobInfo) -> Self {
        Self {
            method: operation.as_str().to_string(),
            data,
        }
    }
}
