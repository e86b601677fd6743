use std::collections::BTreeMap;

use crate::dates::DateWindow;
use crate::grading::{self, Grade};
use crate::normalize;
use crate::records::{AssessmentKind, AssessmentRecord};

/// Which collapse rule a class-wide average is computed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateMode {
    Ca(AssessmentKind),
    Term,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaSubjectRow {
    pub subject_id: String,
    pub score: f64,
    pub max_score: f64,
    pub grade: Grade,
    pub record_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermSubjectRow {
    pub subject_id: String,
    pub ca1: f64,
    pub ca2: f64,
    pub exam: f64,
    pub total: f64,
    pub grade: Grade,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklySubjectRow {
    pub subject_id: String,
    pub classwork_scores: Vec<f64>,
    pub homework_scores: Vec<f64>,
}

impl WeeklySubjectRow {
    pub fn classwork_average(&self) -> Option<f64> {
        mean(&self.classwork_scores)
    }

    pub fn homework_average(&self) -> Option<f64> {
        mean(&self.homework_scores)
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn running_max(slot: &mut Option<f64>, value: f64) {
    *slot = Some(match *slot {
        Some(cur) if cur >= value => cur,
        _ => value,
    });
}

/// One row per subject that has at least one `kind` score; the effective
/// score is the maximum across duplicate entries.
pub fn aggregate_ca(
    records: &[AssessmentRecord],
    kind: AssessmentKind,
    max_score: f64,
) -> Vec<CaSubjectRow> {
    let mut by_subject: BTreeMap<&str, (Option<f64>, usize)> = BTreeMap::new();
    for r in records {
        let Some(score) = normalize::resolve(r, kind) else {
            continue;
        };
        let entry = by_subject.entry(r.subject_id.as_str()).or_insert((None, 0));
        running_max(&mut entry.0, score);
        entry.1 += 1;
    }

    by_subject
        .into_iter()
        .map(|(subject_id, (best, record_count))| {
            let score = best.unwrap_or(0.0);
            CaSubjectRow {
                subject_id: subject_id.to_string(),
                score,
                max_score,
                grade: grading::grade(score, max_score),
                record_count,
            }
        })
        .collect()
}

/// ca1, ca2 and exam are maximized independently, then summed.
pub fn aggregate_term(records: &[AssessmentRecord], max_score: f64) -> Vec<TermSubjectRow> {
    #[derive(Default)]
    struct Maxima {
        ca1: Option<f64>,
        ca2: Option<f64>,
        exam: Option<f64>,
    }

    let mut by_subject: BTreeMap<&str, Maxima> = BTreeMap::new();
    for r in records {
        let ca1 = normalize::resolve(r, AssessmentKind::Ca1);
        let ca2 = normalize::resolve(r, AssessmentKind::Ca2);
        let exam = normalize::resolve(r, AssessmentKind::Exam);
        if ca1.is_none() && ca2.is_none() && exam.is_none() {
            continue;
        }
        let m = by_subject.entry(r.subject_id.as_str()).or_default();
        if let Some(v) = ca1 {
            running_max(&mut m.ca1, v);
        }
        if let Some(v) = ca2 {
            running_max(&mut m.ca2, v);
        }
        if let Some(v) = exam {
            running_max(&mut m.exam, v);
        }
    }

    by_subject
        .into_iter()
        .map(|(subject_id, m)| {
            let ca1 = m.ca1.unwrap_or(0.0);
            let ca2 = m.ca2.unwrap_or(0.0);
            let exam = m.exam.unwrap_or(0.0);
            let total = ca1 + ca2 + exam;
            TermSubjectRow {
                subject_id: subject_id.to_string(),
                ca1,
                ca2,
                exam,
                total,
                grade: grading::grade(total, max_score),
            }
        })
        .collect()
}

/// Keeps every classwork/homework score recorded inside `window`, ordered
/// by date, on a 10-point scale.
pub fn aggregate_weekly(records: &[AssessmentRecord], window: &DateWindow) -> Vec<WeeklySubjectRow> {
    let mut in_window: Vec<&AssessmentRecord> = records
        .iter()
        .filter(|r| window.contains(r.recorded_at))
        .collect();
    in_window.sort_by_key(|r| r.recorded_at);

    let mut by_subject: BTreeMap<&str, WeeklySubjectRow> = BTreeMap::new();
    for r in in_window {
        let classwork = normalize::resolve(r, AssessmentKind::Classwork);
        let homework = normalize::resolve(r, AssessmentKind::Homework);
        if classwork.is_none() && homework.is_none() {
            continue;
        }
        let row = by_subject
            .entry(r.subject_id.as_str())
            .or_insert_with(|| WeeklySubjectRow {
                subject_id: r.subject_id.clone(),
                classwork_scores: Vec::new(),
                homework_scores: Vec::new(),
            });
        if let Some(v) = classwork {
            row.classwork_scores.push(out_of_ten(v, r.max_score));
        }
        if let Some(v) = homework {
            row.homework_scores.push(out_of_ten(v, r.max_score));
        }
    }
    by_subject.into_values().collect()
}

fn out_of_ten(score: f64, max_score: f64) -> f64 {
    if max_score > 0.0 {
        10.0 * score / max_score
    } else {
        score
    }
}

/// Mean of per-subject effective scores, or `None` when nothing resolved.
pub fn overall_average(
    records: &[AssessmentRecord],
    mode: AggregateMode,
    ca_max_score: f64,
    term_max_score: f64,
) -> Option<f64> {
    match mode {
        AggregateMode::Ca(kind) => {
            let rows = aggregate_ca(records, kind, ca_max_score);
            mean(&rows.iter().map(|r| r.score).collect::<Vec<_>>())
        }
        AggregateMode::Term => {
            let rows = aggregate_term(records, term_max_score);
            mean(&rows.iter().map(|r| r.total).collect::<Vec<_>>())
        }
    }
}
