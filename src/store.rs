//! Read and write seams between the engine and the record store. The
//! engine only ever sees these traits; `SqliteStore` backs them with the
//! workspace database.

use rusqlite::{types::Value, Connection, OptionalExtension};

use crate::dates::{self, RawDate};
use crate::error::{ReportError, ReportResult};
use crate::records::{
    AssessmentKind, AssessmentRecord, AttendanceRecord, AttendanceStatus, LegacyScores,
    MeritRecord, Period, ScoreShape, Student,
};
use crate::reports::ReportCard;

pub trait RecordSource {
    fn student_by_id(&self, student_id: &str) -> ReportResult<Option<Student>>;
    /// Roster in the store's own order.
    fn students_by_class(&self, class_id: &str) -> ReportResult<Vec<Student>>;
    fn class_exists(&self, class_id: &str) -> ReportResult<bool>;
    fn assessment_records(&self, student_id: &str, period: &Period) -> ReportResult<Vec<AssessmentRecord>>;
    fn attendance_records(&self, student_id: &str, period: &Period) -> ReportResult<Vec<AttendanceRecord>>;
    fn merit_records(&self, student_id: &str, period: &Period) -> ReportResult<Vec<MeritRecord>>;
    /// Never fails; unknown subjects get a humanized id.
    fn subject_name(&self, subject_id: &str) -> String;
}

pub trait ReportSink {
    /// Replaces any stored document with the same id.
    fn save_report(&self, report: &ReportCard) -> ReportResult<()>;
}

/// `basic_science` -> `Basic Science`.
pub fn humanize_id(id: &str) -> String {
    id.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

fn row_student(r: &rusqlite::Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        class_id: r.get(1)?,
        first_name: r.get(2)?,
        last_name: r.get(3)?,
    })
}

fn record_shape(kind: Option<String>, score: Option<f64>, legacy: LegacyScores) -> ScoreShape {
    let tagged = kind
        .as_deref()
        .and_then(AssessmentKind::parse)
        .map(|kind| (kind, score.unwrap_or(0.0)));
    ScoreShape { tagged, legacy }
}

impl RecordSource for SqliteStore<'_> {
    fn student_by_id(&self, student_id: &str) -> ReportResult<Option<Student>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, class_id, first_name, last_name FROM students WHERE id = ?",
                [student_id],
                row_student,
            )
            .optional()?)
    }

    fn students_by_class(&self, class_id: &str) -> ReportResult<Vec<Student>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, class_id, first_name, last_name
             FROM students
             WHERE class_id = ?
             ORDER BY sort_order",
        )?;
        let students = stmt
            .query_map([class_id], row_student)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(students)
    }

    fn class_exists(&self, class_id: &str) -> ReportResult<bool> {
        Ok(self
            .conn
            .query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| {
                r.get::<_, i64>(0)
            })
            .optional()?
            .is_some())
    }

    fn assessment_records(&self, student_id: &str, period: &Period) -> ReportResult<Vec<AssessmentRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, subject_id, assessment_kind, score,
                    classwork, homework, ca1, ca2, exam,
                    max_score, recorded_at
             FROM assessment_records
             WHERE student_id = ? AND term = ? AND session = ?
             ORDER BY rowid",
        )?;
        let rows = stmt.query_map((student_id, &period.term, &period.session), |r| {
            let legacy = LegacyScores {
                classwork: r.get(4)?,
                homework: r.get(5)?,
                ca1: r.get(6)?,
                ca2: r.get(7)?,
                exam: r.get(8)?,
            };
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                record_shape(r.get(2)?, r.get(3)?, legacy),
                r.get::<_, Option<f64>>(9)?.unwrap_or(0.0),
                r.get::<_, Value>(10)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, subject_id, shape, max_score, recorded_at) = row?;
            if shape.is_empty() {
                tracing::debug!(record = %id, "assessment record carries no score, skipping");
                continue;
            }
            out.push(AssessmentRecord {
                subject_id,
                shape,
                max_score,
                recorded_at: dates::normalize(&RawDate::from_sql(recorded_at)),
            });
        }
        Ok(out)
    }

    fn attendance_records(&self, student_id: &str, period: &Period) -> ReportResult<Vec<AttendanceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, status
             FROM attendance_records
             WHERE student_id = ? AND term = ? AND session = ?
             ORDER BY rowid",
        )?;
        let rows = stmt.query_map((student_id, &period.term, &period.session), |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, Value>(1)?,
                r.get::<_, String>(2)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, date, status) = row?;
            let Some(status) = AttendanceStatus::parse(&status) else {
                tracing::warn!(record = %id, status = %status, "unknown attendance status, skipping");
                continue;
            };
            out.push(AttendanceRecord {
                date: dates::normalize(&RawDate::from_sql(date)),
                status,
            });
        }
        Ok(out)
    }

    fn merit_records(&self, student_id: &str, period: &Period) -> ReportResult<Vec<MeritRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, points, category
             FROM merit_records
             WHERE student_id = ? AND term = ? AND session = ?
             ORDER BY rowid",
        )?;
        let rows = stmt.query_map((student_id, &period.term, &period.session), |r| {
            Ok((
                r.get::<_, Value>(0)?,
                r.get::<_, i64>(1)?,
                r.get::<_, String>(2)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (date, points, category) = row?;
            out.push(MeritRecord {
                date: dates::normalize(&RawDate::from_sql(date)),
                points,
                category,
            });
        }
        Ok(out)
    }

    fn subject_name(&self, subject_id: &str) -> String {
        let found: Result<Option<String>, rusqlite::Error> = self
            .conn
            .query_row("SELECT name FROM subjects WHERE id = ?", [subject_id], |r| {
                r.get(0)
            })
            .optional();
        match found {
            Ok(Some(name)) if !name.trim().is_empty() => name,
            Ok(_) => humanize_id(subject_id),
            Err(e) => {
                tracing::warn!(subject = %subject_id, error = %e, "subject lookup failed, using humanized id");
                humanize_id(subject_id)
            }
        }
    }
}

impl ReportSink for SqliteStore<'_> {
    fn save_report(&self, report: &ReportCard) -> ReportResult<()> {
        let payload = serde_json::to_string(report)
            .map_err(|e| ReportError::InvalidInput(format!("report not serializable: {}", e)))?;
        self.conn.execute(
            "INSERT INTO report_cards(id, kind, student_id, class_id, term, session, content_hash, generated_at, payload)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
               kind = excluded.kind,
               student_id = excluded.student_id,
               class_id = excluded.class_id,
               term = excluded.term,
               session = excluded.session,
               content_hash = excluded.content_hash,
               generated_at = excluded.generated_at,
               payload = excluded.payload",
            (
                &report.id,
                report.kind.as_str(),
                &report.student.id,
                &report.student.class_id,
                &report.term,
                &report.session,
                &report.content_hash,
                report.generated_at.to_rfc3339(),
                payload,
            ),
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReportMeta {
    pub id: String,
    pub kind: String,
    pub student_id: String,
    pub class_id: String,
    pub term: String,
    pub session: String,
    pub content_hash: String,
    pub generated_at: String,
}

pub fn load_report(conn: &Connection, report_id: &str) -> ReportResult<Option<serde_json::Value>> {
    let payload: Option<String> = conn
        .query_row(
            "SELECT payload FROM report_cards WHERE id = ?",
            [report_id],
            |r| r.get(0),
        )
        .optional()?;
    match payload {
        Some(p) => serde_json::from_str(&p)
            .map(Some)
            .map_err(|e| ReportError::InvalidInput(format!("stored report {} is corrupt: {}", report_id, e))),
        None => Ok(None),
    }
}

pub fn list_reports(
    conn: &Connection,
    class_id: Option<&str>,
    student_id: Option<&str>,
) -> ReportResult<Vec<StoredReportMeta>> {
    let mut stmt = conn.prepare(
        "SELECT id, kind, student_id, class_id, term, session, content_hash, generated_at
         FROM report_cards
         WHERE (?1 IS NULL OR class_id = ?1) AND (?2 IS NULL OR student_id = ?2)
         ORDER BY id",
    )?;
    let rows = stmt
        .query_map((class_id, student_id), |r| {
            Ok(StoredReportMeta {
                id: r.get(0)?,
                kind: r.get(1)?,
                student_id: r.get(2)?,
                class_id: r.get(3)?,
                term: r.get(4)?,
                session: r.get(5)?,
                content_hash: r.get(6)?,
                generated_at: r.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn seeded() -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");
        conn.execute_batch(
            "INSERT INTO classes(id, name) VALUES('c1', 'JSS 1A');
             INSERT INTO students(id, class_id, first_name, last_name, sort_order)
               VALUES('s2', 'c1', 'Bola', 'Ade', 1), ('s1', 'c1', 'Ada', 'Obi', 0);
             INSERT INTO subjects(id, name) VALUES('mathematics', 'Mathematics');
             INSERT INTO assessment_records(id, student_id, subject_id, term, session, assessment_kind, score, max_score, recorded_at)
               VALUES('r1', 's1', 'mathematics', 'First Term', '2025/2026', 'ca1', 14, 20, '2025-10-06');
             INSERT INTO assessment_records(id, student_id, subject_id, term, session, ca1, ca2, exam, recorded_at)
               VALUES('r2', 's1', 'basic_science', 'First Term', '2025/2026', 11, 13, 50, 1759708800000);
             INSERT INTO assessment_records(id, student_id, subject_id, term, session, recorded_at)
               VALUES('r3', 's1', 'basic_science', 'First Term', '2025/2026', '2025-10-06');
             INSERT INTO assessment_records(id, student_id, subject_id, term, session, assessment_kind, score, recorded_at)
               VALUES('r4', 's1', 'mathematics', 'Second Term', '2025/2026', 'ca1', 20, '2026-01-12');",
        )
        .expect("seed");
        conn
    }

    #[test]
    fn humanizes_ids() {
        assert_eq!(humanize_id("basic_science"), "Basic Science");
        assert_eq!(humanize_id("civic-EDUCATION"), "Civic Education");
        assert_eq!(humanize_id("english"), "English");
    }

    #[test]
    fn roster_follows_sort_order() {
        let conn = seeded();
        let store = SqliteStore::new(&conn);
        let ids: Vec<String> = store
            .students_by_class("c1")
            .expect("roster")
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert!(store.class_exists("c1").expect("exists"));
        assert!(!store.class_exists("c9").expect("exists"));
        assert!(store.student_by_id("nobody").expect("lookup").is_none());
    }

    #[test]
    fn reads_both_record_layouts_for_one_period() {
        let conn = seeded();
        let store = SqliteStore::new(&conn);
        let records = store
            .assessment_records("s1", &Period::new("First Term", "2025/2026"))
            .expect("records");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].shape, ScoreShape::tagged(AssessmentKind::Ca1, 14.0));
        assert_eq!(records[1].shape.tagged, None);
        assert_eq!(records[1].shape.legacy.ca2, Some(13.0));
        assert_eq!(records[0].recorded_at, records[1].recorded_at);
    }

    #[test]
    fn tagged_row_keeps_its_legacy_columns() {
        let conn = seeded();
        conn.execute(
            "INSERT INTO assessment_records(id, student_id, subject_id, term, session, assessment_kind, score, ca2, recorded_at)
             VALUES('r5', 's2', 'english', 'First Term', '2025/2026', 'ca1', 10, 15, '2025-10-07')",
            [],
        )
        .expect("insert");
        let store = SqliteStore::new(&conn);
        let records = store
            .assessment_records("s2", &Period::new("First Term", "2025/2026"))
            .expect("records");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].shape.tagged, Some((AssessmentKind::Ca1, 10.0)));
        assert_eq!(records[0].shape.legacy.ca2, Some(15.0));
    }

    #[test]
    fn merits_keep_their_category() {
        let conn = seeded();
        conn.execute(
            "INSERT INTO merit_records(id, student_id, term, session, date, points, category, reason)
             VALUES('m1', 's1', 'First Term', '2025/2026', '2025-10-06', 5, 'sports', 'relay')",
            [],
        )
        .expect("insert");
        let store = SqliteStore::new(&conn);
        let merits = store
            .merit_records("s1", &Period::new("First Term", "2025/2026"))
            .expect("merits");
        assert_eq!(merits.len(), 1);
        assert_eq!((merits[0].points, merits[0].category.as_str()), (5, "sports"));
    }

    #[test]
    fn subject_names_fall_back_to_humanized_ids() {
        let conn = seeded();
        let store = SqliteStore::new(&conn);
        assert_eq!(store.subject_name("mathematics"), "Mathematics");
        assert_eq!(store.subject_name("basic_science"), "Basic Science");
    }
}
