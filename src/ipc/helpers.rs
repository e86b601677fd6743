use chrono::NaiveDate;
use rusqlite::Connection;

use crate::config::EngineConfig;
use crate::dates::{self, RawDate};
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::records::{AssessmentKind, Period};

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn required_f64(req: &Request, key: &str) -> Result<f64, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_f64())
        .filter(|v| v.is_finite())
        .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be a number", key), None))
}

pub fn optional_f64(req: &Request, key: &str) -> Result<Option<f64>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => match v.as_f64().filter(|f| f.is_finite()) {
            Some(f) => Ok(Some(f)),
            None => Err(err(&req.id, "bad_params", format!("{} must be a number or null", key), None)),
        },
    }
}

/// Term/session from the request, falling back to the configured current
/// period. This is the only place those defaults are applied.
pub fn period(req: &Request, config: &EngineConfig) -> Period {
    Period::new(
        optional_str(req, "term").unwrap_or_else(|| config.current_term.clone()),
        optional_str(req, "session").unwrap_or_else(|| config.current_session.clone()),
    )
}

pub fn assessment_kind(req: &Request, key: &str) -> Result<AssessmentKind, serde_json::Value> {
    let raw = required_str(req, key)?;
    AssessmentKind::parse(&raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            format!("{} must be one of: classwork, homework, ca1, ca2, exam", key),
            Some(serde_json::json!({ key: raw })),
        )
    })
}

/// Raw date as sent by the caller, stored untouched. Absent means today.
pub fn raw_date(req: &Request, key: &str) -> RawDate {
    match req.params.get(key) {
        None => RawDate::Text(dates::today().format("%Y-%m-%d").to_string()),
        Some(v) => RawDate::from_json(v),
    }
}

/// Window bounds must parse strictly; a report period is not recoverable
/// the way a single record date is.
pub fn required_date(req: &Request, key: &str) -> Result<NaiveDate, serde_json::Value> {
    let raw = req
        .params
        .get(key)
        .map(RawDate::from_json)
        .unwrap_or(RawDate::Missing);
    dates::parse(&raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            format!("{} must be a date (YYYY-MM-DD, epoch millis or timestamp)", key),
            None,
        )
    })
}
