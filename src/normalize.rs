//! Resolves a score for a requested assessment kind from either record
//! layout. All knowledge of the legacy layout lives here.

use crate::records::{AssessmentKind, AssessmentRecord};

/// `Some` only when the record actually carries the requested kind. A
/// tag for another kind does not hide the legacy columns.
pub fn resolve(record: &AssessmentRecord, kind: AssessmentKind) -> Option<f64> {
    match record.shape.tagged {
        Some((own, score)) if own == kind => Some(score),
        _ => record.shape.legacy.field(kind),
    }
}
