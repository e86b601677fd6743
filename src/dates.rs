//! Record dates arrive as ISO strings, epoch milliseconds or wrapped
//! `{seconds, nanoseconds}` timestamps. Everything past the store sees a
//! `NaiveDate` produced by [`normalize`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum RawDate {
    Text(String),
    EpochMillis(i64),
    Wrapped { seconds: i64, nanoseconds: i64 },
    Missing,
}

impl RawDate {
    /// Reads a date column that may hold TEXT (ISO or wrapped JSON) or a number.
    pub fn from_sql(v: Value) -> Self {
        match v {
            Value::Text(s) => {
                let t = s.trim();
                if t.starts_with('{') {
                    match serde_json::from_str::<serde_json::Value>(t) {
                        Ok(json) => RawDate::from_json(&json),
                        Err(_) => RawDate::Text(s),
                    }
                } else {
                    RawDate::Text(s)
                }
            }
            Value::Integer(n) => RawDate::EpochMillis(n),
            Value::Real(f) => RawDate::EpochMillis(f as i64),
            Value::Null | Value::Blob(_) => RawDate::Missing,
        }
    }

    pub fn from_json(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::String(s) => RawDate::Text(s.clone()),
            serde_json::Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(RawDate::EpochMillis)
                .unwrap_or(RawDate::Missing),
            serde_json::Value::Object(obj) => {
                let seconds = obj
                    .get("seconds")
                    .or_else(|| obj.get("_seconds"))
                    .and_then(|s| s.as_i64());
                let nanoseconds = obj
                    .get("nanoseconds")
                    .or_else(|| obj.get("_nanoseconds"))
                    .and_then(|s| s.as_i64())
                    .unwrap_or(0);
                match seconds {
                    Some(seconds) => RawDate::Wrapped {
                        seconds,
                        nanoseconds,
                    },
                    None => RawDate::Missing,
                }
            }
            _ => RawDate::Missing,
        }
    }

    /// Value written to a date column. Wrapped timestamps are kept as JSON text.
    pub fn to_sql(&self) -> Value {
        match self {
            RawDate::Text(s) => Value::Text(s.clone()),
            RawDate::EpochMillis(n) => Value::Integer(*n),
            RawDate::Wrapped {
                seconds,
                nanoseconds,
            } => Value::Text(
                serde_json::json!({ "seconds": seconds, "nanoseconds": nanoseconds }).to_string(),
            ),
            RawDate::Missing => Value::Null,
        }
    }
}

/// Strict conversion; `None` when the value cannot be read as a date.
pub fn parse(raw: &RawDate) -> Option<NaiveDate> {
    match raw {
        RawDate::Text(s) => parse_text(s.trim()),
        RawDate::EpochMillis(ms) => DateTime::<Utc>::from_timestamp_millis(*ms).map(|d| d.date_naive()),
        RawDate::Wrapped {
            seconds,
            nanoseconds,
        } => {
            let nanos = u32::try_from(*nanoseconds).ok()?;
            DateTime::<Utc>::from_timestamp(*seconds, nanos).map(|d| d.date_naive())
        }
        RawDate::Missing => None,
    }
}

fn parse_text(s: &str) -> Option<NaiveDate> {
    if s.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    None
}

/// Lenient conversion used at the record-fetch boundary: unreadable dates
/// become today's date instead of failing the report.
pub fn normalize(raw: &RawDate) -> NaiveDate {
    match parse(raw) {
        Some(d) => d,
        None => {
            tracing::warn!(?raw, "malformed record date, substituting today");
            today()
        }
    }
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Epoch milliseconds of UTC midnight on `d`.
pub fn epoch_millis(d: NaiveDate) -> i64 {
    d.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or(0)
}

/// Inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        if start <= end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    pub fn contains(&self, d: NaiveDate) -> bool {
        self.start <= d && d <= self.end
    }
}
