//! Repository contracts for the logical persistence schema. The concrete
//! store is out of scope for this crate; these traits are the seam the
//! orchestrator wires a real implementation into.

use crate::error::Result;
use crate::models::{Bucket, Channel, ChannelBucketLink, MediaItem, ScheduleBlock};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait ChannelRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Channel>>;
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Channel>>;
    async fn list(&self) -> Result<Vec<Channel>>;
    async fn upsert(&self, channel: Channel) -> Result<()>;
    async fn channel_bucket_links(&self, channel_id: Uuid) -> Result<Vec<ChannelBucketLink>>;
}

#[async_trait]
pub trait BucketRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Bucket>>;
    async fn list(&self) -> Result<Vec<Bucket>>;
}

#[async_trait]
pub trait MediaRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<MediaItem>>;
    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<MediaItem>>;
}

#[async_trait]
pub trait ScheduleBlockRepository: Send + Sync {
    async fn for_channel(&self, channel_id: Uuid) -> Result<Vec<ScheduleBlock>>;
}

/// Backs the EPG Projector's external cache tier: a short in-memory layer
/// lives inside `EpgProjector` itself, a longer-lived external cache is
/// handled here.
#[async_trait]
pub trait EpgCacheRepository: Send + Sync {
    async fn get(&self, channel_id: Uuid) -> Result<Option<EpgCacheEntry>>;
    async fn put(&self, channel_id: Uuid, entry: EpgCacheEntry) -> Result<()>;
    async fn invalidate(&self, channel_id: Uuid) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct EpgCacheEntry {
    pub xml: String,
    pub json: String,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
