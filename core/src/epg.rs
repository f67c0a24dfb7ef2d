//! EPG Projector: derives a guide from the same resolver and schedule-time
//! math the player uses, so the guide and the stream can never disagree
//! about what's airing. The guide is never authoritative and is rebuilt on
//! demand behind a two-tier cache, matching the read-mostly cache shape of
//! `repositories::postgres`'s own query layer.

use crate::error::{CoreError, Result};
use crate::models::{Bucket, Channel, ChannelBucketLink, EpgProgram, MediaItem, ScheduleBlock};
use crate::repositories::{
    BucketRepository, ChannelRepository, EpgCacheEntry, EpgCacheRepository, MediaRepository,
    ScheduleBlockRepository,
};
use crate::resolver::{Resolver, ResolverInput};
use crate::schedule_time::ScheduleTimeService;
use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

const MAX_PROGRAMS_PER_CHANNEL: usize = 10_000;
const EMPTY_SKIP_FORWARD: ChronoDuration = ChronoDuration::hours(1);

struct MemoryCacheEntry {
    programs: Vec<EpgProgram>,
    generated_at: DateTime<Utc>,
}

pub struct EpgProjector {
    channel_repo: Arc<dyn ChannelRepository>,
    bucket_repo: Arc<dyn BucketRepository>,
    media_repo: Arc<dyn MediaRepository>,
    schedule_repo: Arc<dyn ScheduleBlockRepository>,
    cache_repo: Arc<dyn EpgCacheRepository>,
    memory_cache: Mutex<HashMap<Uuid, MemoryCacheEntry>>,
    horizon_hours: u32,
    memory_cache_minutes: u32,
    external_cache_minutes: u32,
}

impl EpgProjector {
    pub fn new(
        channel_repo: Arc<dyn ChannelRepository>,
        bucket_repo: Arc<dyn BucketRepository>,
        media_repo: Arc<dyn MediaRepository>,
        schedule_repo: Arc<dyn ScheduleBlockRepository>,
        cache_repo: Arc<dyn EpgCacheRepository>,
        horizon_hours: u32,
        memory_cache_minutes: u32,
        external_cache_minutes: u32,
    ) -> Self {
        Self {
            channel_repo,
            bucket_repo,
            media_repo,
            schedule_repo,
            cache_repo,
            memory_cache: Mutex::new(HashMap::new()),
            horizon_hours,
            memory_cache_minutes,
            external_cache_minutes,
        }
    }

    /// Invalidates both cache tiers for `channel_id`, forcing the next
    /// `programs` call to regenerate from the repositories.
    pub async fn invalidate(&self, channel_id: Uuid) -> Result<()> {
        self.memory_cache.lock().await.remove(&channel_id);
        self.cache_repo.invalidate(channel_id).await
    }

    pub async fn programs(&self, channel_id: Uuid) -> Result<Vec<EpgProgram>> {
        let now = Utc::now();

        if let Some(entry) = self.memory_cache.lock().await.get(&channel_id) {
            if now - entry.generated_at < ChronoDuration::minutes(self.memory_cache_minutes as i64)
            {
                return Ok(entry.programs.clone());
            }
        }

        if let Some(cached) = self.cache_repo.get(channel_id).await? {
            if now < cached.expires_at {
                if let Ok(programs) = serde_json::from_str::<Vec<EpgProgram>>(&cached.json) {
                    self.store_memory(channel_id, programs.clone(), now).await;
                    return Ok(programs);
                }
            }
        }

        let programs = self.generate(channel_id, now).await?;
        self.store_memory(channel_id, programs.clone(), now).await;

        let json = serde_json::to_string(&programs)?;
        let xml = render_xmltv(&[(channel_id, &programs)], &HashMap::new());
        self.cache_repo
            .put(
                channel_id,
                EpgCacheEntry {
                    xml,
                    json,
                    generated_at: now,
                    expires_at: now
                        + ChronoDuration::minutes(self.external_cache_minutes as i64),
                },
            )
            .await?;

        Ok(programs)
    }

    async fn store_memory(&self, channel_id: Uuid, programs: Vec<EpgProgram>, now: DateTime<Utc>) {
        self.memory_cache.lock().await.insert(
            channel_id,
            MemoryCacheEntry {
                programs,
                generated_at: now,
            },
        );
    }

    pub async fn current_and_next(
        &self,
        channel_id: Uuid,
    ) -> Result<(Option<EpgProgram>, Option<EpgProgram>)> {
        let programs = self.programs(channel_id).await?;
        let now = Utc::now();
        let current_index = programs
            .iter()
            .position(|p| p.start_time <= now && now < p.end_time);
        match current_index {
            Some(idx) => Ok((
                Some(programs[idx].clone()),
                programs.get(idx + 1).cloned(),
            )),
            None => Ok((None, programs.into_iter().find(|p| p.start_time > now))),
        }
    }

    /// The `(file_index, seek_position)` the player should be at right now,
    /// derived the same way the guide derives its current program — used by
    /// the scheduler as the EPG-first recovery source on restart.
    pub async fn position_for_current_program(
        &self,
        channel_id: Uuid,
    ) -> Result<Option<crate::schedule_time::Position>> {
        let channel = self
            .channel_repo
            .get(channel_id)
            .await?
            .ok_or_else(|| CoreError::ChannelNotFound(channel_id.to_string()))?;
        let Some(anchor) = channel.runtime.schedule_anchor_time else {
            return Ok(None);
        };

        let now = Utc::now();
        let resolved = self.resolve_at(channel_id, now).await?;
        if resolved.is_empty() {
            return Ok(None);
        }
        Ok(ScheduleTimeService::position_at(&resolved, anchor, now))
    }

    async fn resolve_at(&self, channel_id: Uuid, at_time: DateTime<Utc>) -> Result<Vec<MediaItem>> {
        let schedule_blocks = self.schedule_repo.for_channel(channel_id).await?;
        let channel_bucket_links = self.channel_repo.channel_bucket_links(channel_id).await?;

        let mut bucket_ids: Vec<Uuid> = schedule_blocks.iter().map(|b| b.bucket_id).collect();
        bucket_ids.extend(channel_bucket_links.iter().map(|l| l.bucket_id));
        bucket_ids.sort_unstable();
        bucket_ids.dedup();

        let mut buckets = Vec::with_capacity(bucket_ids.len());
        for id in &bucket_ids {
            if let Some(bucket) = self.bucket_repo.get(*id).await? {
                buckets.push(bucket);
            }
        }
        let buckets_by_id: HashMap<Uuid, &Bucket> =
            buckets.iter().map(|b| (b.id, b)).collect();

        let mut media_ids: Vec<Uuid> = buckets.iter().flat_map(|b| b.media_ids.clone()).collect();
        media_ids.sort_unstable();
        media_ids.dedup();
        let media_items = self.media_repo.get_many(&media_ids).await?;
        let media_by_id: HashMap<Uuid, &MediaItem> =
            media_items.iter().map(|m| (m.id, m)).collect();

        let input = ResolverInput {
            channel_id,
            schedule_blocks: &schedule_blocks,
            buckets_by_id: &buckets_by_id,
            media_by_id: &media_by_id,
            channel_bucket_links: &channel_bucket_links,
        };
        Ok(Resolver::resolve(&input, at_time, 0))
    }

    async fn generate(&self, channel_id: Uuid, now: DateTime<Utc>) -> Result<Vec<EpgProgram>> {
        let channel = self
            .channel_repo
            .get(channel_id)
            .await?
            .ok_or_else(|| CoreError::ChannelNotFound(channel_id.to_string()))?;
        let anchor = channel.runtime.schedule_anchor_time.unwrap_or(now);

        let schedule_blocks = self.schedule_repo.for_channel(channel_id).await?;
        let channel_bucket_links = self.channel_repo.channel_bucket_links(channel_id).await?;
        let (buckets, media_items) = self.load_catalog(&schedule_blocks, &channel_bucket_links).await?;
        let buckets_by_id: HashMap<Uuid, &Bucket> = buckets.iter().map(|b| (b.id, b)).collect();
        let media_by_id: HashMap<Uuid, &MediaItem> =
            media_items.iter().map(|m| (m.id, m)).collect();

        let horizon_end = now + ChronoDuration::hours(self.horizon_hours as i64);
        let mut cursor = local_midnight(now);
        let mut programs = Vec::new();

        while cursor < horizon_end && programs.len() < MAX_PROGRAMS_PER_CHANNEL {
            let input = ResolverInput {
                channel_id,
                schedule_blocks: &schedule_blocks,
                buckets_by_id: &buckets_by_id,
                media_by_id: &media_by_id,
                channel_bucket_links: &channel_bucket_links,
            };
            let resolved = Resolver::resolve(&input, cursor, 0);
            if resolved.is_empty() {
                cursor += EMPTY_SKIP_FORWARD;
                continue;
            }

            let Some(position) = ScheduleTimeService::position_at(&resolved, anchor, cursor)
            else {
                cursor += EMPTY_SKIP_FORWARD;
                continue;
            };

            let item = &resolved[position.file_index];
            let remaining = (item.duration_seconds - position.seek_position_secs).max(1.0);
            let end = cursor + ChronoDuration::milliseconds((remaining * 1000.0) as i64);

            programs.push(EpgProgram {
                channel_id,
                media_item_id: item.id,
                start_time: cursor,
                end_time: end,
                title: item.display_title(),
                description: item.episode_title.clone(),
                category: None,
                episode_num: episode_num(item),
            });

            cursor = end;
        }

        if programs.len() >= MAX_PROGRAMS_PER_CHANNEL {
            warn!(%channel_id, "epg generation hit the safety ceiling before reaching the horizon");
        }

        debug!(%channel_id, count = programs.len(), "generated epg programs");
        Ok(programs)
    }

    async fn load_catalog(
        &self,
        schedule_blocks: &[ScheduleBlock],
        channel_bucket_links: &[ChannelBucketLink],
    ) -> Result<(Vec<Bucket>, Vec<MediaItem>)> {
        let mut bucket_ids: Vec<Uuid> = schedule_blocks.iter().map(|b| b.bucket_id).collect();
        bucket_ids.extend(channel_bucket_links.iter().map(|l| l.bucket_id));
        bucket_ids.sort_unstable();
        bucket_ids.dedup();

        let mut buckets = Vec::with_capacity(bucket_ids.len());
        for id in &bucket_ids {
            if let Some(bucket) = self.bucket_repo.get(*id).await? {
                buckets.push(bucket);
            }
        }

        let mut media_ids: Vec<Uuid> = buckets.iter().flat_map(|b| b.media_ids.clone()).collect();
        media_ids.sort_unstable();
        media_ids.dedup();
        let media_items = self.media_repo.get_many(&media_ids).await?;

        Ok((buckets, media_items))
    }
}

fn episode_num(item: &MediaItem) -> Option<String> {
    match (item.season, item.episode) {
        (Some(s), Some(e)) => Some(format!("S{s:02}E{e:02}")),
        _ => None,
    }
}

fn local_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    now.with_hour(0)
        .and_then(|d| d.with_minute(0))
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(now)
}

/// Hand-built XMLTV rendering, in the style of string-builder guide
/// generators rather than a generic XML crate: the schema is tiny and
/// fixed, so a templating dependency buys nothing.
pub fn render_xmltv(
    channel_programs: &[(Uuid, &Vec<EpgProgram>)],
    channel_display_names: &HashMap<Uuid, String>,
) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<tv>\n");

    for (channel_id, _) in channel_programs {
        let name = channel_display_names
            .get(channel_id)
            .cloned()
            .unwrap_or_else(|| channel_id.to_string());
        xml.push_str(&format!(
            "  <channel id=\"{}\">\n    <display-name>{}</display-name>\n  </channel>\n",
            channel_id,
            xml_escape(&name)
        ));
    }

    for (channel_id, programs) in channel_programs {
        for program in programs.iter() {
            xml.push_str(&format!(
                "  <programme start=\"{}\" stop=\"{}\" channel=\"{}\">\n",
                xmltv_timestamp(program.start_time),
                xmltv_timestamp(program.end_time),
                channel_id
            ));
            xml.push_str(&format!(
                "    <title>{}</title>\n",
                xml_escape(&program.title)
            ));
            if let Some(desc) = &program.description {
                xml.push_str(&format!(
                    "    <desc>{}</desc>\n",
                    xml_escape(desc)
                ));
            }
            if let Some(category) = &program.category {
                xml.push_str(&format!(
                    "    <category>{}</category>\n",
                    xml_escape(category)
                ));
            }
            if let Some(episode_num) = &program.episode_num {
                xml.push_str(&format!(
                    "    <episode-num system=\"onscreen\">{}</episode-num>\n",
                    xml_escape(episode_num)
                ));
            }
            xml.push_str("  </programme>\n");
        }
    }

    xml.push_str("</tv>\n");
    xml
}

fn xmltv_timestamp(time: DateTime<Utc>) -> String {
    time.format("%Y%m%d%H%M%S +0000").to_string()
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(channel_id: Uuid, title: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> EpgProgram {
        EpgProgram {
            channel_id,
            media_item_id: Uuid::new_v4(),
            start_time: start,
            end_time: end,
            title: title.to_string(),
            description: None,
            category: None,
            episode_num: None,
        }
    }

    #[test]
    fn xmltv_escapes_title_and_includes_channel() {
        let channel_id = Uuid::new_v4();
        let now = Utc::now();
        let programs = vec![program(channel_id, "Tom & Jerry", now, now + ChronoDuration::hours(1))];
        let xml = render_xmltv(&[(channel_id, &programs)], &HashMap::new());
        assert!(xml.contains("Tom &amp; Jerry"));
        assert!(xml.contains(&channel_id.to_string()));
    }

    #[test]
    fn local_midnight_zeroes_time_of_day() {
        let now = Utc::now();
        let midnight = local_midnight(now);
        assert_eq!(midnight.hour(), 0);
        assert_eq!(midnight.minute(), 0);
    }
}
