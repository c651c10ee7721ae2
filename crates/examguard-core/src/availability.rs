//! Exam scheduling windows.
//!
//! An exam without a schedule is always available. A scheduled exam opens at
//! `date` + `start_time` and stays open for `duration_minutes`.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// When an exam may be taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSchedule {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
}

impl ExamSchedule {
    pub fn opens_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn closes_at(&self) -> NaiveDateTime {
        self.opens_at() + TimeDelta::minutes(i64::from(self.duration_minutes))
    }
}

/// Where `now` falls relative to an exam's schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    /// The exam has no schedule.
    AvailableNow,
    /// The window has not opened yet.
    Scheduled,
    /// Inside the window.
    Open,
    /// The window has closed.
    Closed,
}

impl ScheduleStatus {
    /// Whether an attempt may start.
    pub fn accepts_attempts(self) -> bool {
        matches!(self, ScheduleStatus::AvailableNow | ScheduleStatus::Open)
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleStatus::AvailableNow => write!(f, "available now"),
            ScheduleStatus::Scheduled => write!(f, "scheduled"),
            ScheduleStatus::Open => write!(f, "in progress"),
            ScheduleStatus::Closed => write!(f, "closed"),
        }
    }
}

/// Classify `now` against an optional schedule. Both ends of the window are
/// inclusive.
pub fn schedule_status(schedule: Option<&ExamSchedule>, now: NaiveDateTime) -> ScheduleStatus {
    let Some(schedule) = schedule else {
        return ScheduleStatus::AvailableNow;
    };

    if now < schedule.opens_at() {
        ScheduleStatus::Scheduled
    } else if now <= schedule.closes_at() {
        ScheduleStatus::Open
    } else {
        ScheduleStatus::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> ExamSchedule {
        ExamSchedule {
            date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            duration_minutes: 90,
        }
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn unscheduled_is_always_available() {
        assert_eq!(schedule_status(None, at(3, 0)), ScheduleStatus::AvailableNow);
    }

    #[test]
    fn window_boundaries() {
        let s = schedule();
        assert_eq!(schedule_status(Some(&s), at(9, 29)), ScheduleStatus::Scheduled);
        assert_eq!(schedule_status(Some(&s), at(9, 30)), ScheduleStatus::Open);
        assert_eq!(schedule_status(Some(&s), at(11, 0)), ScheduleStatus::Open);
        assert_eq!(schedule_status(Some(&s), at(11, 1)), ScheduleStatus::Closed);
    }

    #[test]
    fn earlier_day_is_closed() {
        let s = schedule();
        let next_day = NaiveDate::from_ymd_opt(2026, 10, 20)
            .unwrap()
            .and_hms_opt(9, 45, 0)
            .unwrap();
        assert_eq!(schedule_status(Some(&s), next_day), ScheduleStatus::Closed);
        assert!(!ScheduleStatus::Closed.accepts_attempts());
        assert!(ScheduleStatus::Open.accepts_attempts());
    }
}
