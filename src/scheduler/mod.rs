//! Watch scheduling.
//!
//! Two job families keyed by watch id: a daily fire at a configured local
//! time, and a real-time poll every ten minutes gated by wake hours. Missed
//! fires are dropped, never replayed; quiet-hour ticks are skipped silently.

pub mod digest;
pub mod registry;

use chrono::{DateTime, Days, LocalResult, NaiveTime, TimeZone};
use chrono_tz::Tz;

pub use registry::{JobId, JobRegistry, JobState, SchedulerContext};

/// Real-time ticks run only inside `[start, end)`. A window that wraps
/// midnight is honoured, though the defaults do not need it.
pub fn within_wake_hours(t: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    if start <= end {
        start <= t && t < end
    } else {
        t >= start || t < end
    }
}

/// Next occurrence of the local time `fire` strictly after `now`.
pub fn next_daily_fire(now: DateTime<Tz>, fire: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let date = if now.time() < fire {
        now.date_naive()
    } else {
        now.date_naive() + Days::new(1)
    };

    match tz.from_local_datetime(&date.and_time(fire)) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt,
        // DST gap: the wall-clock time does not exist that day; fire an hour
        // later rather than dropping the day entirely
        LocalResult::None => tz
            .from_local_datetime(&(date.and_time(fire) + chrono::Duration::hours(1)))
            .earliest()
            .unwrap_or_else(|| now + chrono::Duration::days(1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Asia::Kolkata;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("time")
    }

    #[test]
    fn quiet_hours_boundaries() {
        let start = t(8, 0);
        let end = t(23, 0);

        assert!(!within_wake_hours(t(23, 30), start, end)); // late night skipped
        assert!(!within_wake_hours(t(7, 59), start, end));
        assert!(within_wake_hours(t(8, 0), start, end)); // opening edge runs
        assert!(within_wake_hours(t(22, 59), start, end));
        assert!(!within_wake_hours(t(23, 0), start, end)); // closing edge skipped
    }

    #[test]
    fn wrapping_window_covers_both_sides_of_midnight() {
        let start = t(22, 0);
        let end = t(2, 0);
        assert!(within_wake_hours(t(23, 30), start, end));
        assert!(within_wake_hours(t(1, 0), start, end));
        assert!(!within_wake_hours(t(12, 0), start, end));
    }

    #[test]
    fn next_fire_today_when_still_ahead() {
        let now = Kolkata.with_ymd_and_hms(2026, 3, 10, 8, 0, 0).unwrap();
        let next = next_daily_fire(now, t(9, 0));
        assert_eq!(next.date_naive(), now.date_naive());
        assert_eq!(next.time(), t(9, 0));
    }

    #[test]
    fn next_fire_tomorrow_once_past() {
        let now = Kolkata.with_ymd_and_hms(2026, 3, 10, 9, 30, 0).unwrap();
        let next = next_daily_fire(now, t(9, 0));
        assert_eq!(next.date_naive(), now.date_naive() + Days::new(1));
        assert_eq!(next.time(), t(9, 0));
    }

    #[test]
    fn fire_instant_itself_rolls_to_tomorrow() {
        let now = Kolkata.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
        let next = next_daily_fire(now, t(9, 0));
        assert_eq!(next.date_naive(), now.date_naive() + Days::new(1));
    }
}
