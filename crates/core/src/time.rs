use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// RFC3339字符串转Unix秒，空字符串为0
pub fn string_to_timestamp(value: &str) -> Result<i64, chrono::ParseError> {
    if value.is_empty() {
        return Ok(0);
    }
    Ok(DateTime::parse_from_rfc3339(value)?.timestamp())
}

/// Unix秒转RFC3339字符串，非正数为空字符串
pub fn timestamp_to_string(timestamp: i64) -> String {
    if timestamp <= 0 {
        return String::new();
    }
    match Utc.timestamp_opt(timestamp, 0).single() {
        Some(t) => t.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => String::new(),
    }
}

pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

pub fn now_string() -> String {
    timestamp_to_string(now_timestamp())
}

/// 非空且无法解析（或解析为0）的时间视为非法
pub fn is_illegal_time(value: &str) -> bool {
    !value.is_empty() && string_to_timestamp(value).unwrap_or(0) == 0
}
