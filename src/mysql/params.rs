use chrono::{Datelike, NaiveDate, Timelike};
use mysql_async::{Params, Value as MysqlValue};

use crate::types::Value;

/// Positional parameters for a prepared statement.
#[must_use]
pub fn to_params(params: &[Value]) -> Params {
    Params::Positional(params.iter().map(to_mysql).collect())
}

/// Middleware value to wire value. Lists and JSON documents bind as JSON text.
#[must_use]
pub fn to_mysql(value: &Value) -> MysqlValue {
    match value {
        Value::Null => MysqlValue::NULL,
        Value::Bool(b) => MysqlValue::Int(i64::from(*b)),
        Value::Int(i) => MysqlValue::Int(*i),
        Value::UInt(u) => MysqlValue::UInt(*u),
        Value::Float(f) => MysqlValue::Double(*f),
        Value::Text(s) => MysqlValue::Bytes(s.as_bytes().to_vec()),
        Value::Timestamp(ts) => MysqlValue::Date(
            u16::try_from(ts.year()).unwrap_or(0),
            date_part(ts.month()),
            date_part(ts.day()),
            date_part(ts.hour()),
            date_part(ts.minute()),
            date_part(ts.second()),
            ts.nanosecond() / 1_000,
        ),
        Value::Blob(bytes) => MysqlValue::Bytes(bytes.clone()),
        Value::List(_) | Value::Json(_) => MysqlValue::Bytes(json_text(value).into_bytes()),
    }
}

/// Wire value to middleware value. Byte strings that are valid UTF-8 become text.
#[must_use]
pub fn from_mysql(value: MysqlValue) -> Value {
    match value {
        MysqlValue::NULL => Value::Null,
        MysqlValue::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => Value::Text(text),
            Err(err) => Value::Blob(err.into_bytes()),
        },
        MysqlValue::Int(i) => Value::Int(i),
        MysqlValue::UInt(u) => Value::UInt(u),
        MysqlValue::Float(f) => Value::Float(f64::from(f)),
        MysqlValue::Double(f) => Value::Float(f),
        MysqlValue::Date(year, month, day, hour, minute, second, micros) => {
            NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
                .and_then(|date| {
                    date.and_hms_micro_opt(
                        u32::from(hour),
                        u32::from(minute),
                        u32::from(second),
                        micros,
                    )
                })
                .map_or(Value::Null, Value::Timestamp)
        }
        MysqlValue::Time(negative, days, hours, minutes, seconds, micros) => {
            let hours = days * 24 + u32::from(hours);
            let sign = if negative { "-" } else { "" };
            Value::Text(if micros > 0 {
                format!("{sign}{hours:02}:{minutes:02}:{seconds:02}.{micros:06}")
            } else {
                format!("{sign}{hours:02}:{minutes:02}:{seconds:02}")
            })
        }
    }
}

fn date_part(part: u32) -> u8 {
    u8::try_from(part).unwrap_or(0)
}

fn json_text(value: &Value) -> String {
    match value {
        Value::Json(doc) => doc.to_string(),
        Value::List(items) => {
            let docs: Vec<serde_json::Value> = items.iter().map(json_of).collect();
            serde_json::Value::Array(docs).to_string()
        }
        other => other.to_string(),
    }
}

fn json_of(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => (*b).into(),
        Value::Int(i) => (*i).into(),
        Value::UInt(u) => (*u).into(),
        Value::Float(f) => (*f).into(),
        Value::Json(doc) => doc.clone(),
        Value::List(items) => serde_json::Value::Array(items.iter().map(json_of).collect()),
        other => other.to_string().into(),
    }
}
