use std::collections::BTreeMap;

use serde::Serialize;

use crate::dates::DateWindow;
use crate::grading::{self, MeritLevel};
use crate::records::{AttendanceRecord, AttendanceStatus, MeritRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub total_days: usize,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub excused: usize,
    /// `present / total_days` as a percentage; 0 when nothing was marked.
    pub percentage: f64,
}

/// Every record counts; duplicate `(student, date)` marks are not collapsed.
pub fn summarize_attendance<'a, I>(records: I) -> AttendanceSummary
where
    I: IntoIterator<Item = &'a AttendanceRecord>,
{
    let mut s = AttendanceSummary {
        total_days: 0,
        present: 0,
        absent: 0,
        late: 0,
        excused: 0,
        percentage: 0.0,
    };
    for r in records {
        s.total_days += 1;
        match r.status {
            AttendanceStatus::Present => s.present += 1,
            AttendanceStatus::Absent => s.absent += 1,
            AttendanceStatus::Late => s.late += 1,
            AttendanceStatus::Excused => s.excused += 1,
        }
    }
    if s.total_days > 0 {
        s.percentage = grading::round_off_1_decimal(100.0 * s.present as f64 / s.total_days as f64);
    }
    s
}

impl AttendanceSummary {
    /// Unrounded share of present marks. Thresholds compare against this;
    /// `percentage` is for display.
    pub fn exact_percentage(&self) -> f64 {
        if self.total_days == 0 {
            return 0.0;
        }
        100.0 * self.present as f64 / self.total_days as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeritSummary {
    pub merits: i64,
    pub demerits: i64,
    pub net_points: i64,
    pub entries: usize,
    pub level: MeritLevel,
    /// Net points per category.
    pub by_category: BTreeMap<String, i64>,
}

pub fn summarize_merits<'a, I>(records: I) -> MeritSummary
where
    I: IntoIterator<Item = &'a MeritRecord>,
{
    let mut merits = 0_i64;
    let mut demerits = 0_i64;
    let mut entries = 0_usize;
    let mut by_category: BTreeMap<String, i64> = BTreeMap::new();
    for r in records {
        entries += 1;
        *by_category.entry(r.category.clone()).or_default() += r.points;
        if r.points >= 0 {
            merits += r.points;
        } else {
            demerits += -r.points;
        }
    }
    let net_points = merits - demerits;
    MeritSummary {
        merits,
        demerits,
        net_points,
        entries,
        level: grading::merit_level(net_points),
        by_category,
    }
}

pub fn attendance_in_window<'a>(
    records: &'a [AttendanceRecord],
    window: &'a DateWindow,
) -> impl Iterator<Item = &'a AttendanceRecord> {
    records.iter().filter(move |r| window.contains(r.date))
}

pub fn merits_in_window<'a>(
    records: &'a [MeritRecord],
    window: &'a DateWindow,
) -> impl Iterator<Item = &'a MeritRecord> {
    records.iter().filter(move |r| window.contains(r.date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, d).expect("date")
    }

    fn mark(d: u32, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            date: day(d),
            status,
        }
    }

    fn merit(d: u32, points: i64) -> MeritRecord {
        categorized(d, points, "conduct")
    }

    fn categorized(d: u32, points: i64, category: &str) -> MeritRecord {
        MeritRecord {
            date: day(d),
            points,
            category: category.into(),
        }
    }

    #[test]
    fn attendance_counts_each_status() {
        let records = vec![
            mark(1, AttendanceStatus::Present),
            mark(2, AttendanceStatus::Present),
            mark(2, AttendanceStatus::Present),
            mark(3, AttendanceStatus::Late),
            mark(4, AttendanceStatus::Absent),
        ];
        let s = summarize_attendance(&records);
        assert_eq!(s.total_days, 5);
        assert_eq!((s.present, s.absent, s.late, s.excused), (3, 1, 1, 0));
        assert_eq!(s.percentage, 60.0);
    }

    #[test]
    fn empty_attendance_is_zero_percent() {
        assert_eq!(summarize_attendance(&Vec::<AttendanceRecord>::new()).percentage, 0.0);
    }

    #[test]
    fn merits_net_is_signed_sum() {
        let records = vec![merit(1, 40), merit(2, 30), merit(3, -15)];
        let s = summarize_merits(&records);
        assert_eq!(s.merits, 70);
        assert_eq!(s.demerits, 15);
        assert_eq!(s.net_points, 55);
        assert_eq!(s.entries, 3);
        assert_eq!(s.level, MeritLevel::Silver);
    }

    #[test]
    fn merits_group_net_points_by_category() {
        let records = vec![
            categorized(1, 10, "sports"),
            categorized(2, -4, "conduct"),
            categorized(3, 6, "sports"),
            categorized(4, 3, "conduct"),
        ];
        let s = summarize_merits(&records);
        assert_eq!(s.by_category.get("sports"), Some(&16));
        assert_eq!(s.by_category.get("conduct"), Some(&-1));
        assert_eq!(s.by_category.len(), 2);
    }

    #[test]
    fn exact_percentage_is_not_rounded() {
        let records: Vec<AttendanceRecord> = (0..10_000)
            .map(|i| {
                let status = if i < 6996 {
                    AttendanceStatus::Present
                } else {
                    AttendanceStatus::Absent
                };
                mark(1, status)
            })
            .collect();
        let s = summarize_attendance(&records);
        assert_eq!(s.percentage, 70.0);
        assert!(s.exact_percentage() < 70.0);
    }

    #[test]
    fn window_filters_include_edges() {
        let window = DateWindow::new(day(6), day(10)).expect("window");
        let marks = vec![
            mark(5, AttendanceStatus::Present),
            mark(6, AttendanceStatus::Present),
            mark(10, AttendanceStatus::Absent),
            mark(11, AttendanceStatus::Present),
        ];
        assert_eq!(attendance_in_window(&marks, &window).count(), 2);
        let merits = vec![merit(6, 5), merit(10, -2), merit(12, 9)];
        assert_eq!(summarize_merits(merits_in_window(&merits, &window)).net_points, 3);
    }
}
