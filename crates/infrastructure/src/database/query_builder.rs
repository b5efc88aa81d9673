//! SQL条件拼接
//!
//! 所有取值都以占位符绑定，条件字符串里只出现列名和运算符。

use once_cell::sync::Lazy;
use regex::Regex;

/// 单次存在性查询最多携带的ID数
pub const ID_CHUNK_SIZE: usize = 10;

// 注释符、引号、语句分隔符、比较符以及独立的 or/and
static INJECT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(--|/\*|#|;|'|"|=|\bor\b|\band\b)"#).expect("inject pattern")
});

/// 绑定参数
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(i64),
    Text(String),
}

/// 条件取值，零值和空值不参与拼接
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    Int(i64),
    Text(String),
    Bool(bool),
    List(Vec<String>),
}

impl ConditionValue {
    fn is_zero(&self) -> bool {
        match self {
            ConditionValue::Int(v) => *v == 0,
            ConditionValue::Text(v) => v.is_empty(),
            ConditionValue::Bool(_) => false,
            ConditionValue::List(v) => v.is_empty(),
        }
    }
}

impl From<i64> for ConditionValue {
    fn from(value: i64) -> Self {
        ConditionValue::Int(value)
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        ConditionValue::Text(value.to_string())
    }
}

impl From<String> for ConditionValue {
    fn from(value: String) -> Self {
        ConditionValue::Text(value)
    }
}

impl From<bool> for ConditionValue {
    fn from(value: bool) -> Self {
        ConditionValue::Bool(value)
    }
}

impl From<Vec<String>> for ConditionValue {
    fn from(value: Vec<String>) -> Self {
        ConditionValue::List(value)
    }
}

/// 查询条件构建器
#[derive(Debug, Default, Clone)]
pub struct QueryBuilder {
    conditions: Vec<String>,
    order_by: Option<String>,
    limit: Option<(i64, i64)>,
    args: Vec<SqlParam>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加 `field op ?` 条件，`in` 运算符展开为占位符列表
    pub fn add_condition(
        &mut self,
        field: &str,
        op: &str,
        value: impl Into<ConditionValue>,
    ) -> &mut Self {
        let value = value.into();
        if value.is_zero() {
            return self;
        }

        match value {
            ConditionValue::List(items) => {
                self.conditions
                    .push(format!("{field} {op} ({})", placeholders(items.len())));
                self.args.extend(items.into_iter().map(SqlParam::Text));
            }
            ConditionValue::Int(v) => {
                self.conditions.push(format!("{field} {op} ?"));
                self.args.push(SqlParam::Int(v));
            }
            ConditionValue::Bool(v) => {
                self.conditions.push(format!("{field} {op} ?"));
                self.args.push(SqlParam::Int(i64::from(v)));
            }
            ConditionValue::Text(v) => {
                self.conditions.push(format!("{field} {op} ?"));
                self.args.push(SqlParam::Text(v));
            }
        }
        self
    }

    /// 租户限定，管理员传 `None`
    pub fn add_tenant(&mut self, field: &str, tenant: Option<&str>) -> &mut Self {
        if let Some(tenant) = tenant {
            self.conditions.push(format!("{field} = ?"));
            self.args.push(SqlParam::Text(tenant.to_string()));
        }
        self
    }

    pub fn add_order_by(&mut self, field: &str, desc: bool) -> &mut Self {
        let direction = if desc { "DESC" } else { "ASC" };
        self.order_by = Some(format!("{field} {direction}"));
        self
    }

    /// 分页，`limit` 为0时不分页
    pub fn add_limit(&mut self, limit: i64, page: i64) -> &mut Self {
        if limit > 0 {
            self.limit = Some((limit, page.max(1)));
        }
        self
    }

    pub fn has_conditions(&self) -> bool {
        !self.conditions.is_empty()
    }

    /// 生成 ` WHERE ... ORDER BY ... LIMIT ?, ?` 片段和绑定参数
    pub fn build(&self) -> (String, Vec<SqlParam>) {
        let mut sql = String::new();
        let mut args = self.args.clone();

        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }
        if let Some(order_by) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order_by);
        }
        if let Some((limit, page)) = self.limit {
            sql.push_str(" LIMIT ?, ?");
            args.push(SqlParam::Int((page - 1) * limit));
            args.push(SqlParam::Int(limit));
        }
        (sql, args)
    }
}

/// `?,?,?`
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(",")
}

/// 多行插入的值列表 `(?,?),(?,?)`
pub fn multi_row_values(rows: usize, columns: usize) -> String {
    let row = format!("({})", placeholders(columns));
    vec![row.as_str(); rows].join(",")
}

/// 检查参数是否含有注入特征，返回第一个命中的参数名
pub fn is_parameter_inject(params: &[(&str, &str)]) -> Option<String> {
    params
        .iter()
        .find(|(_, value)| INJECT_PATTERN.is_match(value))
        .map(|(key, _)| key.to_string())
}
