//! 枚举字典
//!
//! 任务类型、执行方式、操作类型、执行状态四组枚举在字符串与整数之间的双向映射。
//! 整数用于存储，字符串用于接口。字典构建后只读。

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;

pub const JOB_TYPE_TIMED: &str = "timed";
pub const JOB_TYPE_PERIODIC: &str = "scheduled";
pub const JOB_TYPE_IMMEDIATE: &str = "real-time";

pub const MODE_HTTP: &str = "http";
pub const MODE_EXE: &str = "exe";
pub const MODE_HTTPS: &str = "https";

pub const OPERATION_CREATE: &str = "create";
pub const OPERATION_UPDATE: &str = "update";
pub const OPERATION_DELETE: &str = "delete";
pub const OPERATION_ENABLE: &str = "enable";
pub const OPERATION_NOTIFY: &str = "notify";

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_EXECUTING: &str = "executing";
pub const STATUS_FAILURE: &str = "failure";
pub const STATUS_INTERRUPT: &str = "interrupt";
pub const STATUS_ABANDON: &str = "abandon";

static SHARED: OnceCell<Arc<EnumDictionary>> = OnceCell::new();

/// 一组枚举值的双向映射
#[derive(Debug, Clone)]
pub struct DictFamily {
    by_name: HashMap<&'static str, i64>,
    by_code: HashMap<i64, &'static str>,
}

impl DictFamily {
    fn from_pairs(pairs: &[(i64, &'static str)]) -> Self {
        let mut by_name = HashMap::with_capacity(pairs.len());
        let mut by_code = HashMap::with_capacity(pairs.len());
        for &(code, name) in pairs {
            by_name.insert(name, code);
            by_code.insert(code, name);
        }
        Self { by_name, by_code }
    }

    /// 未知的键返回 `None`，调用方应按校验失败处理
    pub fn string_to_int(&self, key: &str) -> Option<i64> {
        self.by_name.get(key).copied()
    }

    pub fn int_to_string(&self, key: i64) -> Option<&'static str> {
        self.by_code.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

/// 枚举字典
#[derive(Debug, Clone)]
pub struct EnumDictionary {
    pub job_type: DictFamily,
    pub execution_mode: DictFamily,
    pub operation: DictFamily,
    pub job_status: DictFamily,
}

impl EnumDictionary {
    pub fn new() -> Self {
        Self {
            job_type: DictFamily::from_pairs(&[
                (1, JOB_TYPE_TIMED),
                (2, JOB_TYPE_PERIODIC),
                (3, JOB_TYPE_IMMEDIATE),
            ]),
            execution_mode: DictFamily::from_pairs(&[(1, MODE_HTTP), (2, MODE_EXE), (3, MODE_HTTPS)]),
            operation: DictFamily::from_pairs(&[
                (1, OPERATION_CREATE),
                (2, OPERATION_UPDATE),
                (3, OPERATION_DELETE),
                (4, OPERATION_ENABLE),
                (5, OPERATION_NOTIFY),
            ]),
            job_status: DictFamily::from_pairs(&[
                (1, STATUS_SUCCESS),
                (2, STATUS_EXECUTING),
                (3, STATUS_FAILURE),
                (4, STATUS_INTERRUPT),
                (5, STATUS_ABANDON),
            ]),
        }
    }

    /// 进程内共享的字典实例，首次调用时构建
    pub fn shared() -> Arc<Self> {
        SHARED.get_or_init(|| Arc::new(Self::new())).clone()
    }
}

impl Default for EnumDictionary {
    fn default() -> Self {
        Self::new()
    }
}
