use serde::Serialize;
use std::cmp::Ordering;
use std::time::{Duration, Instant};

use crate::aggregate::{self, AggregateMode};
use crate::config::EngineConfig;
use crate::error::{ReportError, ReportResult};
use crate::records::{Period, Student};
use crate::store::RecordSource;

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    /// A zero budget is already spent.
    pub fn check(&self) -> ReportResult<()> {
        if Instant::now() >= self.at {
            Err(ReportError::Timeout(self.budget.as_millis() as u64))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub position: usize,
    pub total_students: usize,
}

/// Every student's overall average for one class/period/mode, ordered
/// best first. Equal averages are ordered by student id.
#[derive(Debug, Clone)]
pub struct ClassAggregate {
    pub mode: AggregateMode,
    pub period: Period,
    entries: Vec<(String, f64)>,
}

impl ClassAggregate {
    pub fn from_averages(mode: AggregateMode, period: Period, mut entries: Vec<(String, f64)>) -> Self {
        entries.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        Self {
            mode,
            period,
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn position_of(&self, student_id: &str) -> Option<Position> {
        self.entries
            .iter()
            .position(|(id, _)| id == student_id)
            .map(|idx| Position {
                position: idx + 1,
                total_students: self.entries.len(),
            })
    }

    pub fn matches(&self, mode: AggregateMode, period: &Period) -> bool {
        self.mode == mode && &self.period == period
    }
}

/// Re-aggregates every roster member from their raw records. Students with
/// nothing recorded rank with an average of 0.
pub fn compute_class_aggregate(
    source: &dyn RecordSource,
    roster: &[Student],
    mode: AggregateMode,
    period: &Period,
    config: &EngineConfig,
    deadline: &Deadline,
) -> ReportResult<ClassAggregate> {
    let mut entries = Vec::with_capacity(roster.len());
    for s in roster {
        deadline.check()?;
        let records = source.assessment_records(&s.id, period)?;
        let avg = aggregate::overall_average(&records, mode, config.ca_max_score, config.term_max_score)
            .unwrap_or(0.0);
        entries.push((s.id.clone(), avg));
    }
    tracing::debug!(students = entries.len(), ?mode, "class aggregate recomputed");
    Ok(ClassAggregate::from_averages(mode, period.clone(), entries))
}

/// Position of `student` within its class. The student is ranked even if
/// the roster lookup does not return them.
pub fn rank_student(
    source: &dyn RecordSource,
    student: &Student,
    mode: AggregateMode,
    period: &Period,
    config: &EngineConfig,
    deadline: &Deadline,
) -> ReportResult<Position> {
    let mut roster = source.students_by_class(&student.class_id)?;
    if !roster.iter().any(|s| s.id == student.id) {
        roster.push(student.clone());
    }
    let agg = compute_class_aggregate(source, &roster, mode, period, config, deadline)?;
    agg.position_of(&student.id)
        .ok_or_else(|| ReportError::NotFound(format!("student {} in class ranking", student.id)))
}
