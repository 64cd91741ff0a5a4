use std::time::Duration;

use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};

/// When an adapter's passes start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Fixed interval between pass starts; the first pass runs at startup.
    Every(Duration),
    /// Once a day at a local wall-clock time.
    DailyAt(NaiveTime),
}

impl Schedule {
    pub fn every_hours(hours: u64) -> Self {
        Self::Every(Duration::from_secs(hours.max(1) * 3600))
    }

    pub fn runs_at_startup(&self) -> bool {
        matches!(self, Self::Every(_))
    }

    /// Time from `now` until the next start. For `Every` this is the full
    /// interval; the driver keeps its own tick so starts do not drift.
    pub fn next_delay(&self, now: DateTime<Local>) -> Duration {
        match *self {
            Self::Every(interval) => interval,
            Self::DailyAt(at) => until_next(now, at),
        }
    }
}

fn until_next(now: DateTime<Local>, at: NaiveTime) -> Duration {
    let today = now.date_naive();
    let mut day = if now.time() < at {
        Some(today)
    } else {
        today.checked_add_days(Days::new(1))
    };

    // A wall-clock time skipped by a DST jump has no local instant; try the next day.
    for _ in 0..3 {
        let Some(date) = day else { break };
        if let Some(next) = Local.from_local_datetime(&date.and_time(at)).earliest() {
            if let Ok(delay) = (next - now).to_std() {
                return delay;
            }
        }
        day = date.checked_add_days(Days::new(1));
    }
    Duration::from_secs(24 * 3600)
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Every(interval) => write!(f, "every {}h", interval.as_secs() / 3600),
            Self::DailyAt(at) => write!(f, "daily at {}", at.format("%H:%M")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(h: u32, m: u32) -> DateTime<Local> {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        Local
            .from_local_datetime(&date.and_hms_opt(h, m, 0).unwrap())
            .earliest()
            .unwrap()
    }

    #[test]
    fn daily_later_today() {
        let at = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        assert_eq!(
            Schedule::DailyAt(at).next_delay(local(10, 30)),
            Duration::from_secs(90 * 60)
        );
    }

    #[test]
    fn daily_already_passed_waits_for_tomorrow() {
        let at = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
        let delay = Schedule::DailyAt(at).next_delay(local(0, 0));
        // A full day, give or take a DST shift.
        assert!(delay >= Duration::from_secs(23 * 3600));
        assert!(delay <= Duration::from_secs(25 * 3600));
    }

    #[test]
    fn interval_schedules_run_at_startup() {
        assert!(Schedule::every_hours(3).runs_at_startup());
        assert!(!Schedule::DailyAt(NaiveTime::MIN).runs_at_startup());
        assert_eq!(Schedule::every_hours(3).to_string(), "every 3h");
    }
}
