//! Record-store administration: the write side that feeds the engine.

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    assessment_kind, db_conn, optional_f64, optional_str, period, raw_date, required_f64,
    required_str,
};
use crate::ipc::types::{AppState, Request};
use crate::records::AttendanceStatus;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn exists(conn: &Connection, sql: &str, id: &str) -> Result<bool, rusqlite::Error> {
    conn.query_row(sql, [id], |r| r.get::<_, i64>(0))
        .optional()
        .map(|v| v.is_some())
}

fn require_student(conn: &Connection, req: &Request, student_id: &str) -> Result<(), serde_json::Value> {
    match exists(conn, "SELECT 1 FROM students WHERE id = ?", student_id) {
        Ok(true) => Ok(()),
        Ok(false) => Err(err(&req.id, "not_found", "student not found", None)),
        Err(e) => Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    }
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = optional_str(req, "classId").unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Err(e) = conn.execute(
        "INSERT INTO classes(id, name) VALUES(?, ?)",
        (&class_id, &name),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "classes" })),
        );
    }
    ok(&req.id, json!({ "classId": class_id }))
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let first_name = match required_str(req, "firstName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let last_name = optional_str(req, "lastName").unwrap_or_default();

    match exists(conn, "SELECT 1 FROM classes WHERE id = ?", &class_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "class not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let sort_order: i64 = match conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM students WHERE class_id = ?",
        [&class_id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let student_id = optional_str(req, "studentId").unwrap_or_else(|| Uuid::new_v4().to_string());
    if let Err(e) = conn.execute(
        "INSERT INTO students(id, class_id, first_name, last_name, sort_order, updated_at)
         VALUES(?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (&student_id, &class_id, &first_name, &last_name, sort_order),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        );
    }
    ok(&req.id, json!({ "studentId": student_id }))
}

fn handle_subjects_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = conn.execute(
        "INSERT INTO subjects(id, name) VALUES(?, ?)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        (&subject_id, &name),
    ) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "subjectId": subject_id }))
}

fn handle_assessments_record(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let kind = match assessment_kind(req, "assessmentKind") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let score = match required_f64(req, "score") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let max_score = match optional_f64(req, "maxScore") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = require_student(conn, req, &student_id) {
        return e;
    }
    let p = period(req, &state.config);
    let record_id = Uuid::new_v4().to_string();

    if let Err(e) = conn.execute(
        "INSERT INTO assessment_records(
           id, student_id, subject_id, term, session,
           assessment_kind, score, max_score, recorded_at, recorded_by
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &record_id,
            &student_id,
            &subject_id,
            &p.term,
            &p.session,
            kind.as_str(),
            score,
            max_score,
            raw_date(req, "recordedAt").to_sql(),
            optional_str(req, "recordedBy"),
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "assessment_records" })),
        );
    }
    ok(&req.id, json!({ "recordId": record_id }))
}

fn handle_assessments_record_legacy(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut fields: Vec<Option<f64>> = Vec::with_capacity(5);
    for key in ["classwork", "homework", "ca1", "ca2", "exam"] {
        match optional_f64(req, key) {
            Ok(v) => fields.push(v),
            Err(e) => return e,
        }
    }
    if fields.iter().all(|f| f.is_none()) {
        return err(
            &req.id,
            "bad_params",
            "legacy record needs at least one of classwork, homework, ca1, ca2, exam",
            None,
        );
    }
    if let Err(e) = require_student(conn, req, &student_id) {
        return e;
    }
    let p = period(req, &state.config);
    let record_id = Uuid::new_v4().to_string();

    if let Err(e) = conn.execute(
        "INSERT INTO assessment_records(
           id, student_id, subject_id, term, session,
           classwork, homework, ca1, ca2, exam, recorded_at, recorded_by
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &record_id,
            &student_id,
            &subject_id,
            &p.term,
            &p.session,
            fields[0],
            fields[1],
            fields[2],
            fields[3],
            fields[4],
            raw_date(req, "recordedAt").to_sql(),
            optional_str(req, "recordedBy"),
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "assessment_records" })),
        );
    }
    ok(&req.id, json!({ "recordId": record_id }))
}

fn handle_attendance_mark(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let status = match required_str(req, "status") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(status) = AttendanceStatus::parse(&status) else {
        return err(
            &req.id,
            "bad_params",
            "status must be one of: present, absent, late, excused",
            Some(json!({ "status": status })),
        );
    };
    if let Err(e) = require_student(conn, req, &student_id) {
        return e;
    }
    let p = period(req, &state.config);
    let record_id = Uuid::new_v4().to_string();

    if let Err(e) = conn.execute(
        "INSERT INTO attendance_records(id, student_id, term, session, date, status)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &record_id,
            &student_id,
            &p.term,
            &p.session,
            raw_date(req, "date").to_sql(),
            status.as_str(),
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "attendance_records" })),
        );
    }
    ok(&req.id, json!({ "recordId": record_id }))
}

fn handle_merits_record(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(points) = req.params.get("points").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "points must be an integer", None);
    };
    let category = optional_str(req, "category").unwrap_or_else(|| "general".to_string());
    let reason = optional_str(req, "reason").unwrap_or_default();
    if let Err(e) = require_student(conn, req, &student_id) {
        return e;
    }
    let p = period(req, &state.config);
    let record_id = Uuid::new_v4().to_string();

    if let Err(e) = conn.execute(
        "INSERT INTO merit_records(id, student_id, term, session, date, points, category, reason)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &record_id,
            &student_id,
            &p.term,
            &p.session,
            raw_date(req, "date").to_sql(),
            points,
            &category,
            &reason,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "merit_records" })),
        );
    }
    ok(&req.id, json!({ "recordId": record_id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.create" => Some(handle_classes_create(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "subjects.upsert" => Some(handle_subjects_upsert(state, req)),
        "assessments.record" => Some(handle_assessments_record(state, req)),
        "assessments.recordLegacy" => Some(handle_assessments_record_legacy(state, req)),
        "attendance.mark" => Some(handle_attendance_mark(state, req)),
        "merits.record" => Some(handle_merits_record(state, req)),
        _ => None,
    }
}
