use chrono::Utc;

use super::{require_student, report_id, CaBody, CaSubjectLine, ReportBody, ReportCard, ReportKind, StudentSummary};
use crate::aggregate::{self, AggregateMode};
use crate::config::EngineConfig;
use crate::error::{ReportError, ReportResult};
use crate::grading::{self, round_off_1_decimal};
use crate::ranking::{self, ClassAggregate, Deadline};
use crate::records::{AssessmentKind, Period};
use crate::store::RecordSource;
use crate::summary;

/// Builds the continuous-assessment report for `kind` (ca1 or ca2).
///
/// `class_ranking` may carry a precomputed aggregate for the student's
/// class; when absent or built for another mode/period the whole class is
/// re-aggregated.
pub fn generate_ca_report(
    source: &dyn RecordSource,
    config: &EngineConfig,
    student_id: &str,
    kind: AssessmentKind,
    period: &Period,
    class_ranking: Option<&ClassAggregate>,
) -> ReportResult<ReportCard> {
    let Some(report_kind) = ReportKind::for_ca(kind) else {
        return Err(ReportError::InvalidInput(format!(
            "assessmentKind must be ca1 or ca2, got {}",
            kind.as_str()
        )));
    };
    let deadline = Deadline::after(config.report_timeout());
    let student = require_student(source, student_id)?;

    let records = source.assessment_records(&student.id, period)?;
    if records.is_empty() {
        return Err(ReportError::NoData(format!(
            "no assessment records for {} {}",
            period.term, period.session
        )));
    }
    // Records for other kinds still make a report: no subject lines, still ranked.
    let rows = aggregate::aggregate_ca(&records, kind, config.ca_max_score);

    let mode = AggregateMode::Ca(kind);
    let position = match class_ranking
        .filter(|agg| agg.matches(mode, period))
        .and_then(|agg| agg.position_of(&student.id))
    {
        Some(p) => p,
        None => ranking::rank_student(source, &student, mode, period, config, &deadline)?,
    };

    let attendance = summary::summarize_attendance(&source.attendance_records(&student.id, period)?);
    let merits = summary::summarize_merits(&source.merit_records(&student.id, period)?);

    let total_score: f64 = rows.iter().map(|r| r.score).sum();
    let average = if rows.is_empty() {
        0.0
    } else {
        total_score / rows.len() as f64
    };
    let subjects = rows
        .into_iter()
        .map(|r| CaSubjectLine {
            subject_name: source.subject_name(&r.subject_id),
            subject_id: r.subject_id,
            score: r.score,
            max_score: r.max_score,
            percentage: round_off_1_decimal(grading::percentage(r.score, r.max_score)),
            grade: r.grade,
            record_count: r.record_count,
        })
        .collect();

    let card = ReportCard {
        id: report_id(report_kind, &student.id, period),
        kind: report_kind,
        student: StudentSummary::from(&student),
        term: period.term.clone(),
        session: period.session.clone(),
        body: ReportBody::Ca(CaBody {
            assessment_kind: kind,
            subjects,
            total_score,
            average: round_off_1_decimal(average),
            max_score: config.ca_max_score,
            overall_grade: grading::grade(average, config.ca_max_score),
            position,
        }),
        attendance,
        merits,
        content_hash: String::new(),
        generated_at: Utc::now(),
    }
    .seal()?;

    tracing::info!(report = %card.id, position = position.position, "ca report generated");
    Ok(card)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::Letter;
    use crate::reports::fixtures::*;
    use crate::store::SqliteStore;

    fn period() -> Period {
        Period::new(TERM, SESSION)
    }

    fn ca_body(card: &ReportCard) -> &CaBody {
        match &card.body {
            ReportBody::Ca(b) => b,
            other => panic!("expected ca body, got {:?}", other),
        }
    }

    #[test]
    fn ranks_against_the_whole_class() {
        let conn = class_db();
        add_student(&conn, "s1", "Ada", "Obi");
        add_student(&conn, "s2", "Bola", "Ade");
        add_student(&conn, "s3", "Chidi", "Eze");
        add_score(&conn, "s1", "mathematics", "ca1", 12.0, "2025-10-01");
        add_score(&conn, "s1", "mathematics", "ca1", 16.0, "2025-10-02");
        add_score(&conn, "s1", "english", "ca1", 18.0, "2025-10-02");
        add_score(&conn, "s2", "mathematics", "ca1", 19.0, "2025-10-02");
        add_score(&conn, "s2", "english", "ca1", 19.0, "2025-10-02");
        add_attendance(&conn, "s1", "2025-10-01", "present");
        add_attendance(&conn, "s1", "2025-10-02", "absent");
        add_merit(&conn, "s1", "2025-10-02", 60);

        let store = SqliteStore::new(&conn);
        let cfg = EngineConfig::default();
        let card = generate_ca_report(&store, &cfg, "s1", AssessmentKind::Ca1, &period(), None)
            .expect("report");
        assert_eq!(card.id, "ca1_s1_First Term_2025-2026");
        let body = ca_body(&card);
        let math = body
            .subjects
            .iter()
            .find(|s| s.subject_id == "mathematics")
            .expect("math row");
        assert_eq!(math.score, 16.0);
        assert_eq!(math.record_count, 2);
        assert_eq!(body.total_score, 34.0);
        assert_eq!(body.average, 17.0);
        assert_eq!(body.overall_grade.letter, Letter::A);
        assert_eq!(body.position.position, 2);
        assert_eq!(body.position.total_students, 3);
        assert_eq!(card.attendance.percentage, 50.0);
        assert_eq!(card.merits.net_points, 60);
        assert_eq!(card.student.name, "Ada Obi");
    }

    #[test]
    fn missing_student_is_not_found() {
        let conn = class_db();
        let store = SqliteStore::new(&conn);
        let err = generate_ca_report(
            &store,
            &EngineConfig::default(),
            "ghost",
            AssessmentKind::Ca1,
            &period(),
            None,
        )
        .expect_err("should fail");
        assert!(matches!(err, ReportError::NotFound(_)));
    }

    #[test]
    fn student_without_records_is_no_data() {
        let conn = class_db();
        add_student(&conn, "s1", "Ada", "Obi");
        let store = SqliteStore::new(&conn);
        let err = generate_ca_report(
            &store,
            &EngineConfig::default(),
            "s1",
            AssessmentKind::Ca2,
            &period(),
            None,
        )
        .expect_err("should fail");
        assert!(matches!(err, ReportError::NoData(_)));
    }

    #[test]
    fn other_kind_only_still_gets_a_ranked_report() {
        let conn = class_db();
        add_student(&conn, "s1", "Ada", "Obi");
        add_student(&conn, "s2", "Bola", "Ade");
        add_score(&conn, "s1", "mathematics", "ca1", 15.0, "2025-10-01");
        add_score(&conn, "s2", "mathematics", "ca2", 12.0, "2025-10-01");
        let store = SqliteStore::new(&conn);
        let card = generate_ca_report(
            &store,
            &EngineConfig::default(),
            "s1",
            AssessmentKind::Ca2,
            &period(),
            None,
        )
        .expect("report");
        let body = ca_body(&card);
        assert!(body.subjects.is_empty());
        assert_eq!(body.total_score, 0.0);
        assert_eq!(body.average, 0.0);
        assert_eq!(body.overall_grade.letter, Letter::F);
        assert_eq!(body.position.position, 2);
        assert_eq!(body.position.total_students, 2);
    }

    #[test]
    fn mixed_row_feeds_the_legacy_column() {
        let conn = class_db();
        add_student(&conn, "s1", "Ada", "Obi");
        conn.execute(
            "INSERT INTO assessment_records(id, student_id, subject_id, term, session, assessment_kind, score, ca2, max_score, recorded_at)
             VALUES('mixed', 's1', 'mathematics', ?, ?, 'ca1', 10, 15, 20, '2025-10-01')",
            (TERM, SESSION),
        )
        .expect("insert");
        let store = SqliteStore::new(&conn);
        let cfg = EngineConfig::default();
        let ca2 = generate_ca_report(&store, &cfg, "s1", AssessmentKind::Ca2, &period(), None)
            .expect("ca2");
        assert_eq!(ca_body(&ca2).subjects[0].score, 15.0);
        let ca1 = generate_ca_report(&store, &cfg, "s1", AssessmentKind::Ca1, &period(), None)
            .expect("ca1");
        assert_eq!(ca_body(&ca1).subjects[0].score, 10.0);
    }

    #[test]
    fn spent_budget_times_out() {
        let conn = class_db();
        add_student(&conn, "s1", "Ada", "Obi");
        add_score(&conn, "s1", "mathematics", "ca1", 15.0, "2025-10-01");
        let store = SqliteStore::new(&conn);
        let cfg = EngineConfig {
            report_timeout_ms: 0,
            ..EngineConfig::default()
        };
        let err = generate_ca_report(&store, &cfg, "s1", AssessmentKind::Ca1, &period(), None)
            .expect_err("should time out");
        assert!(matches!(err, ReportError::Timeout(0)));
        assert_eq!(err.code(), "timeout");
    }

    #[test]
    fn exam_is_not_a_ca_kind() {
        let conn = class_db();
        let store = SqliteStore::new(&conn);
        let err = generate_ca_report(
            &store,
            &EngineConfig::default(),
            "s1",
            AssessmentKind::Exam,
            &period(),
            None,
        )
        .expect_err("should fail");
        assert!(matches!(err, ReportError::InvalidInput(_)));
    }

    #[test]
    fn regeneration_is_identical_apart_from_timestamp() {
        let conn = class_db();
        add_student(&conn, "s1", "Ada", "Obi");
        add_score(&conn, "s1", "mathematics", "ca2", 11.0, "2025-10-01");
        let store = SqliteStore::new(&conn);
        let cfg = EngineConfig::default();
        let a = generate_ca_report(&store, &cfg, "s1", AssessmentKind::Ca2, &period(), None)
            .expect("first");
        let b = generate_ca_report(&store, &cfg, "s1", AssessmentKind::Ca2, &period(), None)
            .expect("second");
        assert_eq!(a.id, b.id);
        assert_eq!(a.content_hash, b.content_hash);

        let strip = |c: &ReportCard| {
            let mut v = serde_json::to_value(c).expect("json");
            v.as_object_mut().expect("object").remove("generatedAt");
            v.to_string()
        };
        assert_eq!(strip(&a), strip(&b));
    }

    #[test]
    fn stale_precomputed_ranking_is_ignored() {
        let conn = class_db();
        add_student(&conn, "s1", "Ada", "Obi");
        add_score(&conn, "s1", "mathematics", "ca1", 11.0, "2025-10-01");
        let store = SqliteStore::new(&conn);
        let cfg = EngineConfig::default();
        let other = ClassAggregate::from_averages(AggregateMode::Term, period(), vec![("s1".into(), 0.0), ("x".into(), 99.0)]);
        let card = generate_ca_report(&store, &cfg, "s1", AssessmentKind::Ca1, &period(), Some(&other))
            .expect("report");
        assert_eq!(ca_body(&card).position.position, 1);
        assert_eq!(ca_body(&card).position.total_students, 1);
    }
}
