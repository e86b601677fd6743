mod ca;
mod term;
mod weekly;

pub use ca::generate_ca_report;
pub use term::generate_term_report;
pub use weekly::generate_weekly_report;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::dates::{self, DateWindow};
use crate::error::{ReportError, ReportResult};
use crate::grading::Grade;
use crate::ranking::Position;
use crate::records::{AssessmentKind, Period, Student};
use crate::store::RecordSource;
use crate::summary::{AttendanceSummary, MeritSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Ca1,
    Ca2,
    Term,
    Weekly,
}

impl ReportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportKind::Ca1 => "ca1",
            ReportKind::Ca2 => "ca2",
            ReportKind::Term => "term",
            ReportKind::Weekly => "weekly",
        }
    }

    pub fn for_ca(kind: AssessmentKind) -> Option<Self> {
        match kind {
            AssessmentKind::Ca1 => Some(ReportKind::Ca1),
            AssessmentKind::Ca2 => Some(ReportKind::Ca2),
            _ => None,
        }
    }
}

fn key_part(s: &str) -> String {
    s.replace('/', "-")
}

/// `{kind}_{studentId}_{term}_{session}`, slash-free.
pub fn report_id(kind: ReportKind, student_id: &str, period: &Period) -> String {
    format!(
        "{}_{}_{}_{}",
        kind.as_str(),
        key_part(student_id),
        key_part(&period.term),
        key_part(&period.session)
    )
}

/// `weekly_{studentId}_{startMillis}_{endMillis}`.
pub fn weekly_report_id(student_id: &str, window: &DateWindow) -> String {
    format!(
        "{}_{}_{}_{}",
        ReportKind::Weekly.as_str(),
        key_part(student_id),
        dates::epoch_millis(window.start),
        dates::epoch_millis(window.end)
    )
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub id: String,
    pub name: String,
    pub class_id: String,
}

impl From<&Student> for StudentSummary {
    fn from(s: &Student) -> Self {
        Self {
            id: s.id.clone(),
            name: s.display_name(),
            class_id: s.class_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaSubjectLine {
    pub subject_id: String,
    pub subject_name: String,
    pub score: f64,
    pub max_score: f64,
    pub percentage: f64,
    pub grade: Grade,
    pub record_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaBody {
    pub assessment_kind: AssessmentKind,
    pub subjects: Vec<CaSubjectLine>,
    pub total_score: f64,
    pub average: f64,
    pub max_score: f64,
    pub overall_grade: Grade,
    pub position: Position,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermSubjectLine {
    pub subject_id: String,
    pub subject_name: String,
    pub ca1: f64,
    pub ca2: f64,
    pub exam: f64,
    pub total: f64,
    pub grade: Grade,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermBody {
    pub subjects: Vec<TermSubjectLine>,
    pub total_score: f64,
    pub average: f64,
    pub overall_grade: Grade,
    pub position: Position,
    pub promoted: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySubjectLine {
    pub subject_id: String,
    pub subject_name: String,
    pub classwork_scores: Vec<f64>,
    pub classwork_average: Option<f64>,
    pub classwork_count: usize,
    pub homework_scores: Vec<f64>,
    pub homework_average: Option<f64>,
    pub homework_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyBody {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub subjects: Vec<WeeklySubjectLine>,
    pub classwork_average: Option<f64>,
    pub homework_average: Option<f64>,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "variant", rename_all = "camelCase")]
pub enum ReportBody {
    Ca(CaBody),
    Term(TermBody),
    Weekly(WeeklyBody),
}

/// Plain data handed to persistence, rendering and delivery.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCard {
    pub id: String,
    pub kind: ReportKind,
    pub student: StudentSummary,
    pub term: String,
    pub session: String,
    pub body: ReportBody,
    pub attendance: AttendanceSummary,
    pub merits: MeritSummary,
    /// SHA-256 of the document without `generatedAt` and this field.
    pub content_hash: String,
    pub generated_at: DateTime<Utc>,
}

impl ReportCard {
    fn seal(mut self) -> ReportResult<Self> {
        self.content_hash = String::new();
        let mut value = serde_json::to_value(&self)
            .map_err(|e| ReportError::InvalidInput(format!("report not serializable: {}", e)))?;
        if let Some(obj) = value.as_object_mut() {
            obj.remove("generatedAt");
            obj.remove("contentHash");
        }
        let digest = Sha256::digest(value.to_string().as_bytes());
        self.content_hash = digest.iter().map(|b| format!("{:02x}", b)).collect();
        Ok(self)
    }
}

pub(crate) fn require_student(source: &dyn RecordSource, student_id: &str) -> ReportResult<Student> {
    source
        .student_by_id(student_id)?
        .ok_or_else(|| ReportError::NotFound(format!("student {}", student_id)))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_keys_are_slash_free() {
        let p = Period::new("First Term", "2025/2026");
        assert_eq!(
            report_id(ReportKind::Ca1, "stu-9", &p),
            "ca1_stu-9_First Term_2025-2026"
        );
        assert_eq!(
            report_id(ReportKind::Term, "stu-9", &p),
            "term_stu-9_First Term_2025-2026"
        );
    }

    #[test]
    fn weekly_key_uses_epoch_millis() {
        let w = DateWindow::new(
            NaiveDate::from_ymd_opt(2025, 10, 6).expect("date"),
            NaiveDate::from_ymd_opt(2025, 10, 10).expect("date"),
        )
        .expect("window");
        assert_eq!(
            weekly_report_id("stu-9", &w),
            "weekly_stu-9_1759708800000_1760054400000"
        );
    }
}
