//! Schedule Time Service.
//!
//! Maps wall-clock time to `(file_index, seek_position)` given a media list
//! and a channel's anchor time, by modular accumulation over cumulative
//! durations. Pure: no I/O, no mutation, deterministic.

use crate::models::MediaItem;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub file_index: usize,
    pub seek_position_secs: f64,
    pub elapsed_secs: f64,
}

pub struct ScheduleTimeService;

impl ScheduleTimeService {
    /// Computes the position within `media` that should be airing at
    /// `at_time`, given `anchor_time`. Returns `None` if `media` is empty or
    /// its total duration is zero.
    pub fn position_at(
        media: &[MediaItem],
        anchor_time: DateTime<Utc>,
        at_time: DateTime<Utc>,
    ) -> Option<Position> {
        if media.is_empty() {
            return None;
        }

        let total_duration: f64 = media.iter().map(|m| m.duration_seconds).sum();
        if total_duration <= 0.0 {
            return None;
        }

        if at_time < anchor_time {
            return Some(Position {
                file_index: 0,
                seek_position_secs: 0.0,
                elapsed_secs: 0.0,
            });
        }

        let elapsed_secs = (at_time - anchor_time).num_milliseconds() as f64 / 1000.0;
        let offset = elapsed_secs.rem_euclid(total_duration);

        let mut cumulative = 0.0;
        for (index, item) in media.iter().enumerate() {
            let next_cumulative = cumulative + item.duration_seconds;
            if offset < next_cumulative {
                return Some(Position {
                    file_index: index,
                    seek_position_secs: offset - cumulative,
                    elapsed_secs,
                });
            }
            cumulative = next_cumulative;
        }

        // Floating point rounding can leave `offset` a hair past the last
        // item's cumulative boundary; land on the last item's end rather
        // than falling through.
        let last_index = media.len() - 1;
        Some(Position {
            file_index: last_index,
            seek_position_secs: media[last_index].duration_seconds,
            elapsed_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(duration: f64) -> MediaItem {
        MediaItem {
            id: uuid::Uuid::new_v4(),
            path: "/media/x.mp4".into(),
            duration_seconds: duration,
            file_size: 1,
            codec: None,
            resolution: None,
            fps: None,
            bitrate: None,
            show_title: None,
            season: None,
            episode: None,
            episode_title: None,
        }
    }

    #[test]
    fn empty_media_returns_none() {
        let anchor = Utc::now();
        assert!(ScheduleTimeService::position_at(&[], anchor, anchor).is_none());
    }

    #[test]
    fn zero_total_duration_returns_none() {
        let anchor = Utc::now();
        let media = vec![item(0.0), item(0.0)];
        assert!(ScheduleTimeService::position_at(&media, anchor, anchor).is_none());
    }

    #[test]
    fn before_anchor_returns_zero_zero() {
        let anchor = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let before = anchor - chrono::Duration::seconds(10);
        let media = vec![item(60.0)];
        let pos = ScheduleTimeService::position_at(&media, anchor, before).unwrap();
        assert_eq!(pos.file_index, 0);
        assert_eq!(pos.seek_position_secs, 0.0);
    }

    #[test]
    fn single_item_wraps_via_modulo() {
        let anchor = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let media = vec![item(60.0)];
        let at = anchor + chrono::Duration::seconds(45);
        let pos = ScheduleTimeService::position_at(&media, anchor, at).unwrap();
        assert_eq!(pos.file_index, 0);
        assert!((pos.seek_position_secs - 45.0).abs() < 1e-6);

        // One full period later lands on the same position.
        let at_plus_period = anchor + chrono::Duration::seconds(45 + 60);
        let pos2 = ScheduleTimeService::position_at(&media, anchor, at_plus_period).unwrap();
        assert_eq!(pos2.file_index, pos.file_index);
        assert!((pos2.seek_position_secs - pos.seek_position_secs).abs() < 1e-6);
    }

    #[test]
    fn multi_item_cumulative_indexing() {
        let anchor = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let media = vec![item(30.0), item(30.0)];
        let at_28 = anchor + chrono::Duration::seconds(28);
        let pos = ScheduleTimeService::position_at(&media, anchor, at_28).unwrap();
        assert_eq!(pos.file_index, 0);

        let at_40 = anchor + chrono::Duration::seconds(40);
        let pos2 = ScheduleTimeService::position_at(&media, anchor, at_40).unwrap();
        assert_eq!(pos2.file_index, 1);
        assert!((pos2.seek_position_secs - 10.0).abs() < 1e-6);
    }

    #[test]
    fn purity_same_inputs_same_outputs() {
        let anchor = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let media = vec![item(42.0), item(17.0)];
        let at = anchor + chrono::Duration::seconds(99);
        let a = ScheduleTimeService::position_at(&media, anchor, at);
        let b = ScheduleTimeService::position_at(&media, anchor, at);
        assert_eq!(a, b);
    }
}
