use chrono::{DateTime, Datelike, NaiveTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackMode {
    Sequential,
    Shuffle,
    Random,
}

/// `0 = Sunday .. 6 = Saturday`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayOfWeek {
    EveryDay,
    Set(HashSet<u8>),
}

impl DayOfWeek {
    fn contains(&self, weekday_index: u8) -> bool {
        match self {
            DayOfWeek::EveryDay => true,
            DayOfWeek::Set(days) => days.contains(&weekday_index),
        }
    }
}

/// Converts chrono's `Weekday` (Mon=0) into the spec's Sunday=0 convention.
fn weekday_index(weekday: Weekday) -> u8 {
    weekday.num_days_from_sunday() as u8
}

/// A time-of-day rule binding a channel to a bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleBlock {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub bucket_id: Uuid,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub day_of_week: DayOfWeek,
    pub priority: i32,
    pub playback_mode: PlaybackMode,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl ScheduleBlock {
    /// True if this block is active at `at`, honoring the time-window wrap
    /// and day-of-week boundary semantics below.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }

        let time_of_day = at.time();
        let wraps = self.end_time <= self.start_time;

        let in_time_window = if wraps {
            time_of_day >= self.start_time || time_of_day < self.end_time
        } else {
            time_of_day >= self.start_time && time_of_day < self.end_time
        };
        if !in_time_window {
            return false;
        }

        let today = weekday_index(at.weekday());
        if self.day_of_week.contains(today) {
            return true;
        }

        // For a wrapping block, the minutes before `end_time` (the early
        // hours of `at`'s day) belong to the instance of the block that
        // started on the *previous* day, so the day-of-week check for that
        // half of the window is against yesterday, not today — for every
        // minute in that span, not just exact midnight.
        if wraps && time_of_day < self.end_time {
            let yesterday = weekday_index(at.weekday().pred());
            if self.day_of_week.contains(yesterday) {
                return true;
            }
        }

        // Symmetrically, the minutes at/after `start_time` in the last hour
        // before midnight must stay discoverable for a lookup keyed on the
        // following day's weekday (e.g. EPG generation walking forward from
        // tomorrow's midnight).
        let within_last_hour_before_midnight = time_of_day.hour() == 23;
        if wraps && within_last_hour_before_midnight && time_of_day >= self.start_time {
            let tomorrow = weekday_index(at.weekday().succ());
            if self.day_of_week.contains(tomorrow) {
                return true;
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn block(start: &str, end: &str, days: DayOfWeek) -> ScheduleBlock {
        ScheduleBlock {
            id: Uuid::new_v4(),
            channel_id: Uuid::new_v4(),
            bucket_id: Uuid::new_v4(),
            start_time: NaiveTime::parse_from_str(start, "%H:%M").unwrap(),
            end_time: NaiveTime::parse_from_str(end, "%H:%M").unwrap(),
            day_of_week: days,
            priority: 0,
            playback_mode: PlaybackMode::Sequential,
            enabled: true,
            created_at: Utc::now(),
        }
    }

    fn monday_only() -> DayOfWeek {
        DayOfWeek::Set(HashSet::from([1u8]))
    }

    #[test]
    fn wrap_block_active_before_and_after_midnight_on_its_day() {
        let b = block("23:00", "01:00", monday_only());
        let mon_2330 = Utc.with_ymd_and_hms(2024, 1, 1, 23, 30, 0).unwrap(); // Monday
        let tue_0030 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 30, 0).unwrap(); // Tuesday
        let tue_0130 = Utc.with_ymd_and_hms(2024, 1, 2, 1, 30, 0).unwrap();
        assert!(b.is_active_at(mon_2330));
        assert!(b.is_active_at(tue_0030));
        assert!(!b.is_active_at(tue_0130));
    }

    #[test]
    fn disabled_block_is_never_active() {
        let mut b = block("00:00", "23:59", DayOfWeek::EveryDay);
        b.enabled = false;
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert!(!b.is_active_at(now));
    }

    #[test]
    fn non_wrapping_block_respects_half_open_interval() {
        let b = block("12:00", "14:00", DayOfWeek::EveryDay);
        let at_1200 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let at_1400 = Utc.with_ymd_and_hms(2024, 1, 1, 14, 0, 0).unwrap();
        assert!(b.is_active_at(at_1200));
        assert!(!b.is_active_at(at_1400));
    }
}
