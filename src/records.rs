use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentKind {
    Classwork,
    Homework,
    Ca1,
    Ca2,
    Exam,
}

impl AssessmentKind {
    pub const ALL: [AssessmentKind; 5] = [
        AssessmentKind::Classwork,
        AssessmentKind::Homework,
        AssessmentKind::Ca1,
        AssessmentKind::Ca2,
        AssessmentKind::Exam,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssessmentKind::Classwork => "classwork",
            AssessmentKind::Homework => "homework",
            AssessmentKind::Ca1 => "ca1",
            AssessmentKind::Ca2 => "ca2",
            AssessmentKind::Exam => "exam",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let t = s.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(t))
    }
}

/// Academic period every record query is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Period {
    pub term: String,
    pub session: String,
}

impl Period {
    pub fn new(term: impl Into<String>, session: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            session: session.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub class_id: String,
    pub first_name: String,
    pub last_name: String,
}

impl Student {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Per-kind columns of the older record layout, where one row carries
/// several assessments at once.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LegacyScores {
    pub classwork: Option<f64>,
    pub homework: Option<f64>,
    pub ca1: Option<f64>,
    pub ca2: Option<f64>,
    pub exam: Option<f64>,
}

impl LegacyScores {
    pub fn field(&self, kind: AssessmentKind) -> Option<f64> {
        match kind {
            AssessmentKind::Classwork => self.classwork,
            AssessmentKind::Homework => self.homework,
            AssessmentKind::Ca1 => self.ca1,
            AssessmentKind::Ca2 => self.ca2,
            AssessmentKind::Exam => self.exam,
        }
    }

    pub fn is_empty(&self) -> bool {
        AssessmentKind::ALL.iter().all(|k| self.field(*k).is_none())
    }
}

/// Scores carried by one stored row. A row may be tagged with a kind,
/// may carry legacy columns, or both; the tag wins only for its own kind.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreShape {
    pub tagged: Option<(AssessmentKind, f64)>,
    pub legacy: LegacyScores,
}

impl ScoreShape {
    pub fn tagged(kind: AssessmentKind, score: f64) -> Self {
        Self {
            tagged: Some((kind, score)),
            legacy: LegacyScores::default(),
        }
    }

    pub fn legacy(legacy: LegacyScores) -> Self {
        Self {
            tagged: None,
            legacy,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tagged.is_none() && self.legacy.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AssessmentRecord {
    pub subject_id: String,
    pub shape: ScoreShape,
    pub max_score: f64,
    pub recorded_at: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Excused => "excused",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            "late" => Some(AttendanceStatus::Late),
            "excused" => Some(AttendanceStatus::Excused),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttendanceRecord {
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone)]
pub struct MeritRecord {
    pub date: NaiveDate,
    pub points: i64,
    pub category: String,
}
