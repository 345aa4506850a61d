//! 查询结果中的标量值
//!
//! 各后端驱动把原生类型统一转换为 [`Value`]，导出时 CSV 与 JSON 共用同一套文本规则：
//!
//! - 日期/时间使用 ISO-8601（`YYYY-MM-DD`、`HH:MM:SS[.ffffff]`、`YYYY-MM-DDTHH:MM:SS[.ffffff]`）
//! - 带时区的时间戳转为 UTC 的 RFC 3339（`...Z`）
//! - 二进制使用标准 base64（带填充）
//! - DECIMAL 保留为精确的十进制字符串

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer, ser::Error as _};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ValueError {
    #[error("不支持序列化的列类型: {0}")]
    Unsupported(String),
    #[error("非有限浮点数无法写入 JSON: {0}")]
    NonFinite(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Decimal(String),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
    Uuid(Uuid),
    /// 驱动无法解析的原生类型，保留类型名以便报错
    Unsupported(String),
}

impl Value {
    /// 转换为 CSV 字段文本，NULL 输出为空字符串
    pub fn to_text(&self) -> Result<String, ValueError> {
        let text = match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::UInt(u) => u.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Decimal(s) | Value::Text(s) => s.clone(),
            Value::Bytes(bytes) => general_purpose::STANDARD.encode(bytes),
            Value::Date(d) => format_date(d),
            Value::Time(t) => format_time(t),
            Value::DateTime(dt) => format_datetime(dt),
            Value::Timestamp(ts) => format_timestamp(ts),
            Value::Json(json) => json.to_string(),
            Value::Uuid(uuid) => uuid.hyphenated().to_string(),
            Value::Unsupported(ty) => return Err(ValueError::Unsupported(ty.clone())),
        };
        Ok(text)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::UInt(u) => serializer.serialize_u64(*u),
            Value::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Value::Float(f) => Err(S::Error::custom(ValueError::NonFinite(*f))),
            Value::Json(json) => json.serialize(serializer),
            Value::Unsupported(ty) => Err(S::Error::custom(ValueError::Unsupported(ty.clone()))),
            other => {
                let text = other.to_text().map_err(S::Error::custom)?;
                serializer.serialize_str(&text)
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

// 与 JSON 数字的输出保持一致（1.0 而不是 1）
fn format_float(f: f64) -> String {
    serde_json::Number::from_f64(f)
        .map(|n| n.to_string())
        .unwrap_or_else(|| f.to_string())
}

fn format_date(d: &NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn format_time(t: &NaiveTime) -> String {
    t.format("%H:%M:%S%.f").to_string()
}

fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
