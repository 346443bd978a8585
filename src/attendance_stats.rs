use crate::data::attendance::AttendanceStatus;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceStats {
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub excused: usize,
    pub total: usize,
}

impl AttendanceStats {
    /// Present or late, over everyone marked. `None` before anyone is marked.
    #[allow(clippy::cast_precision_loss)]
    pub fn attendance_rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(crate::grading::round_to_one_decimal(
                (self.present + self.late) as f64 / self.total as f64 * 100.0,
            ))
        }
    }
}

/// Single pass over a student -> status mapping. Anything that isn't one of the four statuses
/// still counts towards `total`.
pub fn get_attendance_stats<K, V: AsRef<str>>(statuses: &HashMap<K, V>) -> AttendanceStats {
    tally(statuses.values())
}

pub fn tally<V: AsRef<str>>(statuses: impl IntoIterator<Item = V>) -> AttendanceStats {
    let mut stats = AttendanceStats::default();
    for status in statuses {
        stats.total += 1;
        match status.as_ref().parse() {
            Ok(AttendanceStatus::Present) => stats.present += 1,
            Ok(AttendanceStatus::Absent) => stats.absent += 1,
            Ok(AttendanceStatus::Late) => stats.late += 1,
            Ok(AttendanceStatus::Excused) => stats.excused += 1,
            Err(_) => {}
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_each_status() {
        let statuses = HashMap::from([("s1", "present"), ("s2", "absent"), ("s3", "present")]);
        assert_eq!(
            get_attendance_stats(&statuses),
            AttendanceStats {
                present: 2,
                absent: 1,
                late: 0,
                excused: 0,
                total: 3,
            }
        );
    }

    #[test]
    fn typed_statuses_work_too() {
        let statuses = HashMap::from([
            (1, AttendanceStatus::Late),
            (2, AttendanceStatus::Excused),
            (3, AttendanceStatus::Present),
            (4, AttendanceStatus::Late),
        ]);
        let stats = get_attendance_stats(&statuses);
        assert_eq!(stats.late, 2);
        assert_eq!(stats.excused, 1);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.attendance_rate(), Some(75.0));
    }

    #[test]
    fn unknown_statuses_only_count_towards_total() {
        let stats = tally(["present", "on holiday", "PRESENT"]);
        assert_eq!(stats.present, 1);
        assert_eq!(stats.total, 3);
    }

    #[test]
    fn empty_has_no_rate() {
        let stats = get_attendance_stats(&HashMap::<u8, &str>::new());
        assert_eq!(stats, AttendanceStats::default());
        assert_eq!(stats.attendance_rate(), None);
    }
}
