use serde::Serialize;

use crate::aggregate::AggregateMode;
use crate::config::EngineConfig;
use crate::dates::DateWindow;
use crate::error::{ReportError, ReportResult};
use crate::ranking::{self, ClassAggregate, Deadline};
use crate::records::{AssessmentKind, Period, Student};
use crate::reports::{self, ReportCard};
use crate::store::{RecordSource, ReportSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkKind {
    Ca(AssessmentKind),
    Term,
    Weekly(DateWindow),
}

impl BulkKind {
    fn ranking_mode(&self) -> Option<AggregateMode> {
        match self {
            BulkKind::Ca(kind) => Some(AggregateMode::Ca(*kind)),
            BulkKind::Term => Some(AggregateMode::Term),
            BulkKind::Weekly(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    pub success_count: usize,
    pub failed_count: usize,
    /// One `"{studentName}: {reason}"` entry per failed student.
    pub errors: Vec<String>,
    pub report_ids: Vec<String>,
}

/// Generates and stores one report per student of `class_id`. A failing
/// student is recorded in `errors` and the batch moves on; this function
/// itself never fails.
pub fn generate_bulk(
    source: &dyn RecordSource,
    sink: &dyn ReportSink,
    config: &EngineConfig,
    class_id: &str,
    kind: BulkKind,
    period: &Period,
) -> BulkOutcome {
    let mut outcome = BulkOutcome::default();

    let roster = match load_roster(source, class_id) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(class = %class_id, error = %e, "bulk generation could not load roster");
            outcome.errors.push(e.to_string());
            return outcome;
        }
    };
    tracing::info!(class = %class_id, students = roster.len(), ?kind, "bulk generation started");

    // One class-wide aggregate serves every student's ranking. If it cannot
    // be built, each report falls back to its own recomputation.
    let class_ranking: Option<ClassAggregate> = kind.ranking_mode().and_then(|mode| {
        let deadline = Deadline::after(config.report_timeout());
        match ranking::compute_class_aggregate(source, &roster, mode, period, config, &deadline) {
            Ok(agg) => {
                tracing::debug!(class = %class_id, ranked = agg.len(), "class aggregate ready");
                Some(agg)
            }
            Err(e) => {
                tracing::warn!(class = %class_id, error = %e, "class aggregate precompute failed");
                None
            }
        }
    });

    for student in &roster {
        let result = generate_one(source, config, student, kind, period, class_ranking.as_ref())
            .and_then(|card| {
                sink.save_report(&card)?;
                Ok(card.id)
            });
        match result {
            Ok(id) => {
                outcome.success_count += 1;
                outcome.report_ids.push(id);
            }
            Err(e) => {
                tracing::warn!(student = %student.id, error = %e, "report generation failed");
                outcome.failed_count += 1;
                outcome.errors.push(format!("{}: {}", student.display_name(), e));
            }
        }
    }

    tracing::info!(
        class = %class_id,
        success = outcome.success_count,
        failed = outcome.failed_count,
        "bulk generation finished"
    );
    outcome
}

fn load_roster(source: &dyn RecordSource, class_id: &str) -> ReportResult<Vec<Student>> {
    if !source.class_exists(class_id)? {
        return Err(ReportError::NotFound(format!("class {}", class_id)));
    }
    source.students_by_class(class_id)
}

fn generate_one(
    source: &dyn RecordSource,
    config: &EngineConfig,
    student: &Student,
    kind: BulkKind,
    period: &Period,
    class_ranking: Option<&ClassAggregate>,
) -> ReportResult<ReportCard> {
    match kind {
        BulkKind::Ca(k) => reports::generate_ca_report(source, config, &student.id, k, period, class_ranking),
        BulkKind::Term => reports::generate_term_report(source, config, &student.id, period, class_ranking),
        BulkKind::Weekly(window) => reports::generate_weekly_report(source, &student.id, &window, period),
    }
}
