use std::path::PathBuf;

use serde_json::json;

use crate::bulk::{self, BulkKind};
use crate::bundle;
use crate::dates::DateWindow;
use crate::error::ReportError;
use crate::ipc::error::{err, ok, report_err};
use crate::ipc::helpers::{assessment_kind, db_conn, optional_str, period, required_date, required_str};
use crate::ipc::types::{AppState, Request};
use crate::records::AssessmentKind;
use crate::reports::{self, ReportCard};
use crate::store::{self, ReportSink, SqliteStore};

fn week_window(req: &Request) -> Result<DateWindow, serde_json::Value> {
    let start = required_date(req, "weekStart")?;
    let end = required_date(req, "weekEnd")?;
    DateWindow::new(start, end).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            "weekStart must not be after weekEnd",
            Some(json!({ "weekStart": start.to_string(), "weekEnd": end.to_string() })),
        )
    })
}

fn respond_with_saved(req: &Request, store: &SqliteStore<'_>, card: ReportCard) -> serde_json::Value {
    if let Err(e) = store.save_report(&card) {
        return report_err(&req.id, e);
    }
    match serde_json::to_value(&card) {
        Ok(v) => ok(&req.id, json!({ "report": v })),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

fn handle_generate_ca(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let kind = match assessment_kind(req, "assessmentKind") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let p = period(req, &state.config);
    let store = SqliteStore::new(conn);
    match reports::generate_ca_report(&store, &state.config, &student_id, kind, &p, None) {
        Ok(card) => respond_with_saved(req, &store, card),
        Err(e) => report_err(&req.id, e),
    }
}

fn handle_generate_term(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let p = period(req, &state.config);
    let store = SqliteStore::new(conn);
    match reports::generate_term_report(&store, &state.config, &student_id, &p, None) {
        Ok(card) => respond_with_saved(req, &store, card),
        Err(e) => report_err(&req.id, e),
    }
}

fn handle_generate_weekly(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let window = match week_window(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let p = period(req, &state.config);
    let store = SqliteStore::new(conn);
    match reports::generate_weekly_report(&store, &student_id, &window, &p) {
        Ok(card) => respond_with_saved(req, &store, card),
        Err(e) => report_err(&req.id, e),
    }
}

fn handle_generate_bulk(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let report_kind = match required_str(req, "reportKind") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let kind = match report_kind.to_ascii_lowercase().as_str() {
        "ca1" => BulkKind::Ca(AssessmentKind::Ca1),
        "ca2" => BulkKind::Ca(AssessmentKind::Ca2),
        "ca" => match assessment_kind(req, "assessmentKind") {
            Ok(k @ (AssessmentKind::Ca1 | AssessmentKind::Ca2)) => BulkKind::Ca(k),
            Ok(other) => {
                return err(
                    &req.id,
                    "bad_params",
                    "assessmentKind must be ca1 or ca2 for a ca batch",
                    Some(json!({ "assessmentKind": other.as_str() })),
                )
            }
            Err(e) => return e,
        },
        "term" => BulkKind::Term,
        "weekly" => match week_window(req) {
            Ok(w) => BulkKind::Weekly(w),
            Err(e) => return e,
        },
        _ => {
            return err(
                &req.id,
                "bad_params",
                "reportKind must be one of: ca, ca1, ca2, term, weekly",
                Some(json!({ "reportKind": report_kind })),
            )
        }
    };
    let p = period(req, &state.config);
    let store = SqliteStore::new(conn);
    let outcome = bulk::generate_bulk(&store, &store, &state.config, &class_id, kind, &p);
    match serde_json::to_value(&outcome) {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

fn handle_reports_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let report_id = match required_str(req, "reportId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store::load_report(conn, &report_id) {
        Ok(Some(doc)) => ok(&req.id, json!({ "report": doc })),
        Ok(None) => report_err(&req.id, ReportError::NotFound(format!("report {}", report_id))),
        Err(e) => report_err(&req.id, e),
    }
}

fn handle_reports_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = optional_str(req, "classId");
    let student_id = optional_str(req, "studentId");
    match store::list_reports(conn, class_id.as_deref(), student_id.as_deref()) {
        Ok(rows) => ok(&req.id, json!({ "reports": rows })),
        Err(e) => report_err(&req.id, e),
    }
}

fn handle_export_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let out_path = match required_str(req, "outPath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    match bundle::export_class_reports(conn, &class_id, &out_path) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "bundleFormat": summary.bundle_format,
                "reportCount": summary.report_count,
                "path": out_path.to_string_lossy(),
            }),
        ),
        Err(e) => err(&req.id, "export_failed", format!("{:#}", e), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.generateCa" => Some(handle_generate_ca(state, req)),
        "reports.generateTerm" => Some(handle_generate_term(state, req)),
        "reports.generateWeekly" => Some(handle_generate_weekly(state, req)),
        "reports.generateBulk" => Some(handle_generate_bulk(state, req)),
        "reports.get" => Some(handle_reports_get(state, req)),
        "reports.list" => Some(handle_reports_list(state, req)),
        "reports.exportBundle" => Some(handle_export_bundle(state, req)),
        _ => None,
    }
}
