//! Postgres-backed repository implementations. Connection handling and
//! error mapping follow the teacher's `PostgresDatabase`: a pooled
//! connection opened once at startup, runtime `sqlx::query`/`query_as`
//! (no compile-time macros, since there is no migrated database available
//! at build time here), and every driver error collapsed into
//! `CoreError::RepositoryUnavailable` at the call site.

use super::traits::{
    BucketRepository, ChannelRepository, EpgCacheEntry, EpgCacheRepository, MediaRepository,
    ScheduleBlockRepository,
};
use crate::error::{CoreError, Result};
use crate::models::{
    Bucket, BucketKind, Channel, ChannelBucketLink, ChannelConfig, ChannelRuntime, ChannelState,
    DayOfWeek, MediaItem, PlaybackMode, ScheduleBlock,
};
use async_trait::async_trait;
use chrono::NaiveTime;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct PostgresPool {
    pool: PgPool,
}

impl PostgresPool {
    pub async fn connect(connection_string: &str) -> Result<Self> {
        info!("connecting to Postgres");
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(connection_string)
            .await
            .map_err(|e| CoreError::RepositoryUnavailable(e.to_string()))?;
        info!("connected to Postgres");
        Ok(Self { pool })
    }

    pub async fn migrate(&self, migration_sql: &str) -> Result<()> {
        sqlx::query(migration_sql)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::RepositoryUnavailable(e.to_string()))?;
        Ok(())
    }
}

fn channel_state_from_str(s: &str) -> ChannelState {
    match s {
        "starting" => ChannelState::Starting,
        "streaming" => ChannelState::Streaming,
        "transitioning" => ChannelState::Transitioning,
        "stopping" => ChannelState::Stopping,
        _ => ChannelState::Idle,
    }
}

fn channel_state_to_str(state: ChannelState) -> &'static str {
    match state {
        ChannelState::Idle => "idle",
        ChannelState::Starting => "starting",
        ChannelState::Streaming => "streaming",
        ChannelState::Transitioning => "transitioning",
        ChannelState::Stopping => "stopping",
    }
}

fn playback_mode_from_str(s: &str) -> PlaybackMode {
    match s {
        "shuffle" => PlaybackMode::Shuffle,
        "random" => PlaybackMode::Random,
        _ => PlaybackMode::Sequential,
    }
}

fn day_of_week_from_row(every_day: bool, days: Option<Vec<i32>>) -> DayOfWeek {
    if every_day {
        return DayOfWeek::EveryDay;
    }
    DayOfWeek::Set(days.unwrap_or_default().into_iter().map(|d| d as u8).collect())
}

pub struct PostgresChannelRepository {
    pool: PostgresPool,
}

impl PostgresChannelRepository {
    pub fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChannelRepository for PostgresChannelRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Channel>> {
        debug!(%id, "fetching channel");
        let row = sqlx::query(
            r#"
            SELECT id, name, slug, output_dir, video_bitrate, audio_bitrate,
                   width, height, fps, segment_duration_secs,
                   state, current_index, schedule_anchor_time, viewer_count, last_viewer_seen_at
            FROM channels WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool.pool)
        .await
        .map_err(|e| CoreError::RepositoryUnavailable(e.to_string()))?;

        Ok(row.map(|r| Channel {
            config: ChannelConfig {
                id: r.get("id"),
                name: r.get("name"),
                slug: r.get("slug"),
                output_dir: std::path::PathBuf::from(r.get::<String, _>("output_dir")),
                video_bitrate: r.get("video_bitrate"),
                audio_bitrate: r.get("audio_bitrate"),
                resolution: (r.get::<i32, _>("width") as u32, r.get::<i32, _>("height") as u32),
                fps: r.get::<i32, _>("fps") as u32,
                segment_duration_secs: r.get::<i32, _>("segment_duration_secs") as u32,
            },
            runtime: ChannelRuntime {
                state: channel_state_from_str(r.get::<String, _>("state").as_str()),
                current_index: r.get::<i32, _>("current_index") as usize,
                schedule_anchor_time: r.get("schedule_anchor_time"),
                viewer_count: r.get::<i32, _>("viewer_count") as u32,
                last_viewer_seen_at: r.get("last_viewer_seen_at"),
            },
        }))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Channel>> {
        let row = sqlx::query("SELECT id FROM channels WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool.pool)
            .await
            .map_err(|e| CoreError::RepositoryUnavailable(e.to_string()))?;
        match row {
            Some(r) => self.get(r.get("id")).await,
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Channel>> {
        let rows = sqlx::query("SELECT id FROM channels")
            .fetch_all(&self.pool.pool)
            .await
            .map_err(|e| CoreError::RepositoryUnavailable(e.to_string()))?;
        let mut channels = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(channel) = self.get(row.get("id")).await? {
                channels.push(channel);
            }
        }
        Ok(channels)
    }

    async fn upsert(&self, channel: Channel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO channels (
                id, name, slug, output_dir, video_bitrate, audio_bitrate,
                width, height, fps, segment_duration_secs,
                state, current_index, schedule_anchor_time, viewer_count, last_viewer_seen_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                slug = EXCLUDED.slug,
                output_dir = EXCLUDED.output_dir,
                video_bitrate = EXCLUDED.video_bitrate,
                audio_bitrate = EXCLUDED.audio_bitrate,
                width = EXCLUDED.width,
                height = EXCLUDED.height,
                fps = EXCLUDED.fps,
                segment_duration_secs = EXCLUDED.segment_duration_secs,
                state = EXCLUDED.state,
                current_index = EXCLUDED.current_index,
                schedule_anchor_time = EXCLUDED.schedule_anchor_time,
                viewer_count = EXCLUDED.viewer_count,
                last_viewer_seen_at = EXCLUDED.last_viewer_seen_at
            "#,
        )
        .bind(channel.config.id)
        .bind(&channel.config.name)
        .bind(&channel.config.slug)
        .bind(channel.config.output_dir.to_string_lossy().to_string())
        .bind(&channel.config.video_bitrate)
        .bind(&channel.config.audio_bitrate)
        .bind(channel.config.resolution.0 as i32)
        .bind(channel.config.resolution.1 as i32)
        .bind(channel.config.fps as i32)
        .bind(channel.config.segment_duration_secs as i32)
        .bind(channel_state_to_str(channel.runtime.state))
        .bind(channel.runtime.current_index as i32)
        .bind(channel.runtime.schedule_anchor_time)
        .bind(channel.runtime.viewer_count as i32)
        .bind(channel.runtime.last_viewer_seen_at)
        .execute(&self.pool.pool)
        .await
        .map_err(|e| CoreError::RepositoryUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn channel_bucket_links(&self, channel_id: Uuid) -> Result<Vec<ChannelBucketLink>> {
        let rows = sqlx::query(
            "SELECT bucket_id, priority FROM channel_bucket_links WHERE channel_id = $1 ORDER BY priority DESC",
        )
        .bind(channel_id)
        .fetch_all(&self.pool.pool)
        .await
        .map_err(|e| CoreError::RepositoryUnavailable(e.to_string()))?;
        Ok(rows
            .into_iter()
            .map(|r| ChannelBucketLink {
                bucket_id: r.get("bucket_id"),
                priority: r.get::<i32, _>("priority"),
            })
            .collect())
    }
}

pub struct PostgresBucketRepository {
    pool: PostgresPool,
}

impl PostgresBucketRepository {
    pub fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }

    async fn media_ids_for(&self, bucket_id: Uuid) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            "SELECT media_id FROM bucket_media WHERE bucket_id = $1 ORDER BY position ASC",
        )
        .bind(bucket_id)
        .fetch_all(&self.pool.pool)
        .await
        .map_err(|e| CoreError::RepositoryUnavailable(e.to_string()))?;
        Ok(rows.into_iter().map(|r| r.get("media_id")).collect())
    }
}

#[async_trait]
impl BucketRepository for PostgresBucketRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Bucket>> {
        let row = sqlx::query("SELECT id, name, kind FROM buckets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool.pool)
            .await
            .map_err(|e| CoreError::RepositoryUnavailable(e.to_string()))?;
        match row {
            Some(r) => {
                let kind = match r.get::<String, _>("kind").as_str() {
                    "channel_specific" => BucketKind::ChannelSpecific,
                    _ => BucketKind::Global,
                };
                Ok(Some(Bucket {
                    id: r.get("id"),
                    name: r.get("name"),
                    kind,
                    media_ids: self.media_ids_for(id).await?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Bucket>> {
        let rows = sqlx::query("SELECT id FROM buckets")
            .fetch_all(&self.pool.pool)
            .await
            .map_err(|e| CoreError::RepositoryUnavailable(e.to_string()))?;
        let mut buckets = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(bucket) = self.get(row.get("id")).await? {
                buckets.push(bucket);
            }
        }
        Ok(buckets)
    }
}

pub struct PostgresMediaRepository {
    pool: PostgresPool,
}

impl PostgresMediaRepository {
    pub fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }

    fn row_to_media(row: &sqlx::postgres::PgRow) -> MediaItem {
        MediaItem {
            id: row.get("id"),
            path: std::path::PathBuf::from(row.get::<String, _>("path")),
            duration_seconds: row.get("duration_seconds"),
            file_size: row.get::<i64, _>("file_size") as u64,
            codec: row.get("codec"),
            resolution: match (
                row.get::<Option<i32>, _>("width"),
                row.get::<Option<i32>, _>("height"),
            ) {
                (Some(w), Some(h)) => Some((w as u32, h as u32)),
                _ => None,
            },
            fps: row.get("fps"),
            bitrate: row.get::<Option<i32>, _>("bitrate").map(|b| b as u32),
            show_title: row.get("show_title"),
            season: row.get::<Option<i32>, _>("season").map(|s| s as u32),
            episode: row.get::<Option<i32>, _>("episode").map(|e| e as u32),
            episode_title: row.get("episode_title"),
        }
    }
}

#[async_trait]
impl MediaRepository for PostgresMediaRepository {
    async fn get(&self, id: Uuid) -> Result<Option<MediaItem>> {
        let row = sqlx::query(
            r#"
            SELECT id, path, duration_seconds, file_size, codec, width, height,
                   fps, bitrate, show_title, season, episode, episode_title
            FROM media_items WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool.pool)
        .await
        .map_err(|e| CoreError::RepositoryUnavailable(e.to_string()))?;
        Ok(row.as_ref().map(Self::row_to_media))
    }

    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<MediaItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, path, duration_seconds, file_size, codec, width, height,
                   fps, bitrate, show_title, season, episode, episode_title
            FROM media_items WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool.pool)
        .await
        .map_err(|e| CoreError::RepositoryUnavailable(e.to_string()))?;
        Ok(rows.iter().map(Self::row_to_media).collect())
    }
}

pub struct PostgresScheduleBlockRepository {
    pool: PostgresPool,
}

impl PostgresScheduleBlockRepository {
    pub fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScheduleBlockRepository for PostgresScheduleBlockRepository {
    async fn for_channel(&self, channel_id: Uuid) -> Result<Vec<ScheduleBlock>> {
        let rows = sqlx::query(
            r#"
            SELECT id, channel_id, bucket_id, start_time, end_time, every_day, days,
                   priority, playback_mode, enabled, created_at
            FROM schedule_blocks WHERE channel_id = $1
            "#,
        )
        .bind(channel_id)
        .fetch_all(&self.pool.pool)
        .await
        .map_err(|e| CoreError::RepositoryUnavailable(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|r| ScheduleBlock {
                id: r.get("id"),
                channel_id: r.get("channel_id"),
                bucket_id: r.get("bucket_id"),
                start_time: r.get::<NaiveTime, _>("start_time"),
                end_time: r.get::<NaiveTime, _>("end_time"),
                day_of_week: day_of_week_from_row(r.get("every_day"), r.get("days")),
                priority: r.get("priority"),
                playback_mode: playback_mode_from_str(r.get::<String, _>("playback_mode").as_str()),
                enabled: r.get("enabled"),
                created_at: r.get("created_at"),
            })
            .collect())
    }
}

pub struct PostgresEpgCacheRepository {
    pool: PostgresPool,
}

impl PostgresEpgCacheRepository {
    pub fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EpgCacheRepository for PostgresEpgCacheRepository {
    async fn get(&self, channel_id: Uuid) -> Result<Option<EpgCacheEntry>> {
        let row = sqlx::query(
            "SELECT xml, json, generated_at, expires_at FROM epg_cache WHERE channel_id = $1",
        )
        .bind(channel_id)
        .fetch_optional(&self.pool.pool)
        .await
        .map_err(|e| CoreError::RepositoryUnavailable(e.to_string()))?;
        Ok(row.map(|r| EpgCacheEntry {
            xml: r.get("xml"),
            json: r.get("json"),
            generated_at: r.get("generated_at"),
            expires_at: r.get("expires_at"),
        }))
    }

    async fn put(&self, channel_id: Uuid, entry: EpgCacheEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO epg_cache (channel_id, xml, json, generated_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (channel_id) DO UPDATE SET
                xml = EXCLUDED.xml,
                json = EXCLUDED.json,
                generated_at = EXCLUDED.generated_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(channel_id)
        .bind(&entry.xml)
        .bind(&entry.json)
        .bind(entry.generated_at)
        .bind(entry.expires_at)
        .execute(&self.pool.pool)
        .await
        .map_err(|e| CoreError::RepositoryUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn invalidate(&self, channel_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM epg_cache WHERE channel_id = $1")
            .bind(channel_id)
            .execute(&self.pool.pool)
            .await
            .map_err(|e| CoreError::RepositoryUnavailable(e.to_string()))?;
        Ok(())
    }
}
