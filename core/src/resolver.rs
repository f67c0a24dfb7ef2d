//! Playlist Resolver.
//!
//! Computes the ordered media list that currently applies to a channel from
//! the two-level content model (schedule blocks → bucket, falling back to a
//! channel's linked buckets). This is the side-effect-free sibling of the
//! Schedule Time Service (`schedule_time`): both are pure and are used by
//! both the Channel Scheduler and the EPG Projector, which is what keeps
//! the guide and the stream in agreement.

use crate::models::{Bucket, ChannelBucketLink, MediaItem, ScheduleBlock};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Read-only view over the data a single `resolve` call needs. The
/// orchestrator assembles this from repository reads; `Resolver::resolve`
/// itself performs no I/O and never suspends.
pub struct ResolverInput<'a> {
    pub channel_id: Uuid,
    pub schedule_blocks: &'a [ScheduleBlock],
    pub buckets_by_id: &'a HashMap<Uuid, &'a Bucket>,
    pub media_by_id: &'a HashMap<Uuid, &'a MediaItem>,
    /// Buckets linked directly to the channel (fallback path), already in
    /// link-priority order.
    pub channel_bucket_links: &'a [ChannelBucketLink],
}

pub struct Resolver;

impl Resolver {
    /// Resolves the ordered media list active at `at_time`.
    ///
    /// `current_index_hint` is accepted for contract parity with the
    /// design's `Resolve(channelId, atTime, currentIndexHint)` signature; it
    /// does not affect which list is returned (only the caller's own advance
    /// policy uses it) but is threaded through so future resolver variants
    /// (e.g. one honoring shuffle) have a hook without changing callers.
    pub fn resolve(
        input: &ResolverInput<'_>,
        at_time: DateTime<Utc>,
        _current_index_hint: usize,
    ) -> Vec<MediaItem> {
        if let Some(block) = Self::active_block(input.schedule_blocks, at_time) {
            if let Some(bucket) = input.buckets_by_id.get(&block.bucket_id) {
                return Self::materialize(bucket, input.media_by_id);
            }
            return Vec::new();
        }

        // No active block: concatenate all buckets linked to the channel,
        // in link-priority order.
        let mut items = Vec::new();
        for link in input.channel_bucket_links {
            if let Some(bucket) = input.buckets_by_id.get(&link.bucket_id) {
                items.extend(Self::materialize(bucket, input.media_by_id));
            }
        }
        items
    }

    /// Highest-priority enabled block active at `at_time`, ties broken by
    /// earliest `created_at`.
    fn active_block<'a>(
        blocks: &'a [ScheduleBlock],
        at_time: DateTime<Utc>,
    ) -> Option<&'a ScheduleBlock> {
        blocks
            .iter()
            .filter(|b| b.is_active_at(at_time))
            .max_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then(b.created_at.cmp(&a.created_at))
            })
    }

    fn materialize(bucket: &Bucket, media_by_id: &HashMap<Uuid, &MediaItem>) -> Vec<MediaItem> {
        bucket
            .media_ids
            .iter()
            .filter_map(|id| media_by_id.get(id).map(|m| (*m).clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BucketKind, DayOfWeek, PlaybackMode};
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn media(id: Uuid, duration: f64) -> MediaItem {
        MediaItem {
            id,
            path: format!("/media/{id}.mp4").into(),
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

    fn bucket(id: Uuid, media_ids: Vec<Uuid>) -> Bucket {
        Bucket {
            id,
            name: "bucket".into(),
            kind: BucketKind::Global,
            media_ids,
        }
    }

    fn block(
        channel_id: Uuid,
        bucket_id: Uuid,
        priority: i32,
        created_at: DateTime<Utc>,
    ) -> ScheduleBlock {
        ScheduleBlock {
            id: Uuid::new_v4(),
            channel_id,
            bucket_id,
            start_time: chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            end_time: chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            day_of_week: DayOfWeek::EveryDay,
            priority,
            playback_mode: PlaybackMode::Sequential,
            enabled: true,
            created_at,
        }
    }

    #[test]
    fn falls_back_to_channel_buckets_when_no_block_active() {
        let channel_id = Uuid::new_v4();
        let m1 = Uuid::new_v4();
        let media_item = media(m1, 60.0);
        let bucket_id = Uuid::new_v4();
        let b = bucket(bucket_id, vec![m1]);

        let buckets_by_id = HashMap::from([(bucket_id, &b)]);
        let media_by_id = HashMap::from([(m1, &media_item)]);
        let links = vec![ChannelBucketLink {
            bucket_id,
            priority: 0,
        }];

        let input = ResolverInput {
            channel_id,
            schedule_blocks: &[],
            buckets_by_id: &buckets_by_id,
            media_by_id: &media_by_id,
            channel_bucket_links: &links,
        };

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let resolved = Resolver::resolve(&input, now, 0);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, m1);
    }

    #[test]
    fn prefers_highest_priority_active_block() {
        let channel_id = Uuid::new_v4();
        let (m1, m2) = (Uuid::new_v4(), Uuid::new_v4());
        let (item1, item2) = (media(m1, 30.0), media(m2, 30.0));
        let (bucket_a, bucket_b) = (Uuid::new_v4(), Uuid::new_v4());
        let ba = bucket(bucket_a, vec![m1]);
        let bb = bucket(bucket_b, vec![m2]);

        let buckets_by_id = HashMap::from([(bucket_a, &ba), (bucket_b, &bb)]);
        let media_by_id = HashMap::from([(m1, &item1), (m2, &item2)]);

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let low = block(channel_id, bucket_a, 1, now);
        let high = block(channel_id, bucket_b, 10, now);
        let blocks = vec![low, high];

        let input = ResolverInput {
            channel_id,
            schedule_blocks: &blocks,
            buckets_by_id: &buckets_by_id,
            media_by_id: &media_by_id,
            channel_bucket_links: &[],
        };

        let resolved = Resolver::resolve(&input, now, 0);
        assert_eq!(resolved[0].id, m2);
    }

    #[test]
    fn empty_when_nothing_applies() {
        let channel_id = Uuid::new_v4();
        let input = ResolverInput {
            channel_id,
            schedule_blocks: &[],
            buckets_by_id: &HashMap::new(),
            media_by_id: &HashMap::new(),
            channel_bucket_links: &[],
        };
        let now = Utc::now();
        assert!(Resolver::resolve(&input, now, 0).is_empty());
    }

    #[test]
    fn wrap_block_boundary_monday_only() {
        let channel_id = Uuid::new_v4();
        let m1 = Uuid::new_v4();
        let item1 = media(m1, 30.0);
        let bucket_id = Uuid::new_v4();
        let b = bucket(bucket_id, vec![m1]);
        let buckets_by_id = HashMap::from([(bucket_id, &b)]);
        let media_by_id = HashMap::from([(m1, &item1)]);

        let mut wrap_block = block(channel_id, bucket_id, 5, Utc::now());
        wrap_block.start_time = chrono::NaiveTime::from_hms_opt(23, 0, 0).unwrap();
        wrap_block.end_time = chrono::NaiveTime::from_hms_opt(1, 0, 0).unwrap();
        wrap_block.day_of_week = DayOfWeek::Set(HashSet::from([1u8])); // Monday
        let blocks = vec![wrap_block];

        let input = ResolverInput {
            channel_id,
            schedule_blocks: &blocks,
            buckets_by_id: &buckets_by_id,
            media_by_id: &media_by_id,
            channel_bucket_links: &[],
        };

        let mon_2330 = Utc.with_ymd_and_hms(2024, 1, 1, 23, 30, 0).unwrap();
        let tue_0030 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 30, 0).unwrap();
        let tue_0130 = Utc.with_ymd_and_hms(2024, 1, 2, 1, 30, 0).unwrap();

        assert_eq!(Resolver::resolve(&input, mon_2330, 0).len(), 1);
        assert_eq!(Resolver::resolve(&input, tue_0030, 0).len(), 1);
        assert_eq!(Resolver::resolve(&input, tue_0130, 0).len(), 0);
    }
}
