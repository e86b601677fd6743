use chrono::Utc;

use super::{require_student, weekly_report_id, ReportBody, ReportCard, ReportKind, StudentSummary, WeeklyBody, WeeklySubjectLine};
use crate::aggregate::{self, mean};
use crate::dates::DateWindow;
use crate::error::ReportResult;
use crate::grading::round_off_1_decimal;
use crate::records::Period;
use crate::store::RecordSource;
use crate::summary::{self, AttendanceSummary, MeritSummary};

const ATTENDANCE_STRONG: f64 = 90.0;
const ATTENDANCE_WEAK: f64 = 70.0;
const SCORE_STRONG: f64 = 7.0;
const SCORE_WEAK: f64 = 5.0;

/// Progress summary for `window`. Records are fetched for `period` and
/// filtered by their own dates; an empty week is a valid report.
pub fn generate_weekly_report(
    source: &dyn RecordSource,
    student_id: &str,
    window: &DateWindow,
    period: &Period,
) -> ReportResult<ReportCard> {
    let student = require_student(source, student_id)?;

    let records = source.assessment_records(&student.id, period)?;
    let attendance_records = source.attendance_records(&student.id, period)?;
    let merit_records = source.merit_records(&student.id, period)?;

    let rows = aggregate::aggregate_weekly(&records, window);
    let attendance = summary::summarize_attendance(summary::attendance_in_window(&attendance_records, window));
    let merits = summary::summarize_merits(summary::merits_in_window(&merit_records, window));

    let all_classwork: Vec<f64> = rows.iter().flat_map(|r| r.classwork_scores.iter().copied()).collect();
    let all_homework: Vec<f64> = rows.iter().flat_map(|r| r.homework_scores.iter().copied()).collect();
    let classwork_average = mean(&all_classwork);
    let homework_average = mean(&all_homework);

    let (strengths, improvements) = observations(&attendance, classwork_average, homework_average, &merits);

    let subjects = rows
        .into_iter()
        .map(|r| WeeklySubjectLine {
            subject_name: source.subject_name(&r.subject_id),
            classwork_average: r.classwork_average().map(round_off_1_decimal),
            classwork_count: r.classwork_scores.len(),
            homework_average: r.homework_average().map(round_off_1_decimal),
            homework_count: r.homework_scores.len(),
            subject_id: r.subject_id,
            classwork_scores: r.classwork_scores,
            homework_scores: r.homework_scores,
        })
        .collect();

    let card = ReportCard {
        id: weekly_report_id(&student.id, window),
        kind: ReportKind::Weekly,
        student: StudentSummary::from(&student),
        term: period.term.clone(),
        session: period.session.clone(),
        body: ReportBody::Weekly(WeeklyBody {
            week_start: window.start,
            week_end: window.end,
            subjects,
            classwork_average: classwork_average.map(round_off_1_decimal),
            homework_average: homework_average.map(round_off_1_decimal),
            strengths,
            improvements,
        }),
        attendance,
        merits,
        content_hash: String::new(),
        generated_at: Utc::now(),
    }
    .seal()?;

    tracing::info!(report = %card.id, "weekly report generated");
    Ok(card)
}

/// Fixed-threshold strengths and improvement areas. Nothing fires for a
/// measure with no underlying records.
fn observations(
    attendance: &AttendanceSummary,
    classwork_average: Option<f64>,
    homework_average: Option<f64>,
    merits: &MeritSummary,
) -> (Vec<String>, Vec<String>) {
    let mut strengths = Vec::new();
    let mut improvements = Vec::new();

    if attendance.total_days > 0 {
        let exact = attendance.exact_percentage();
        if exact >= ATTENDANCE_STRONG {
            strengths.push(format!("Excellent attendance ({:.1}%)", attendance.percentage));
        } else if exact < ATTENDANCE_WEAK {
            improvements.push(format!(
                "Attendance needs improvement ({:.1}%)",
                attendance.percentage
            ));
        }
    }

    for (label, avg) in [("classwork", classwork_average), ("homework", homework_average)] {
        let Some(avg) = avg else {
            continue;
        };
        if avg >= SCORE_STRONG {
            strengths.push(format!("Strong {} performance (average {:.1}/10)", label, avg));
        } else if avg < SCORE_WEAK {
            improvements.push(format!("{} scores need attention (average {:.1}/10)", capitalize(label), avg));
        }
    }

    if merits.net_points > 0 {
        strengths.push(format!("Positive conduct ({} net merit points)", merits.net_points));
    } else if merits.net_points < 0 {
        improvements.push(format!("Conduct needs attention ({} net merit points)", merits.net_points));
    }

    (strengths, improvements)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
