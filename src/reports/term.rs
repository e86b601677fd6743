use chrono::Utc;

use super::{require_student, report_id, ReportBody, ReportCard, ReportKind, StudentSummary, TermBody, TermSubjectLine};
use crate::aggregate::{self, AggregateMode};
use crate::config::EngineConfig;
use crate::error::{ReportError, ReportResult};
use crate::grading::{self, round_off_1_decimal};
use crate::ranking::{self, ClassAggregate, Deadline};
use crate::records::Period;
use crate::store::RecordSource;
use crate::summary;

/// End-of-term report: ca1 + ca2 + exam per subject, class position and
/// promotion against `config.pass_mark`.
pub fn generate_term_report(
    source: &dyn RecordSource,
    config: &EngineConfig,
    student_id: &str,
    period: &Period,
    class_ranking: Option<&ClassAggregate>,
) -> ReportResult<ReportCard> {
    let deadline = Deadline::after(config.report_timeout());
    let student = require_student(source, student_id)?;

    let records = source.assessment_records(&student.id, period)?;
    if records.is_empty() {
        return Err(ReportError::NoData(format!(
            "no assessment records for {} {}",
            period.term, period.session
        )));
    }
    let rows = aggregate::aggregate_term(&records, config.term_max_score);

    let mode = AggregateMode::Term;
    let position = match class_ranking
        .filter(|agg| agg.matches(mode, period))
        .and_then(|agg| agg.position_of(&student.id))
    {
        Some(p) => p,
        None => ranking::rank_student(source, &student, mode, period, config, &deadline)?,
    };

    let attendance = summary::summarize_attendance(&source.attendance_records(&student.id, period)?);
    let merits = summary::summarize_merits(&source.merit_records(&student.id, period)?);

    let total_score: f64 = rows.iter().map(|r| r.total).sum();
    let average = if rows.is_empty() {
        0.0
    } else {
        total_score / rows.len() as f64
    };
    let subjects = rows
        .into_iter()
        .map(|r| TermSubjectLine {
            subject_name: source.subject_name(&r.subject_id),
            subject_id: r.subject_id,
            ca1: r.ca1,
            ca2: r.ca2,
            exam: r.exam,
            total: r.total,
            grade: r.grade,
        })
        .collect();

    let card = ReportCard {
        id: report_id(ReportKind::Term, &student.id, period),
        kind: ReportKind::Term,
        student: StudentSummary::from(&student),
        term: period.term.clone(),
        session: period.session.clone(),
        body: ReportBody::Term(TermBody {
            subjects,
            total_score,
            average: round_off_1_decimal(average),
            overall_grade: grading::grade(average, config.term_max_score),
            position,
            promoted: average >= config.pass_mark,
        }),
        attendance,
        merits,
        content_hash: String::new(),
        generated_at: Utc::now(),
    }
    .seal()?;

    tracing::info!(report = %card.id, position = position.position, "term report generated");
    Ok(card)
}
