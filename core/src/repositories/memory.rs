//! In-memory repository implementations used by tests and local
//! development, in the spirit of the teacher's
//! `MediaDatabase::new_memory()` (`core/src/database/mod.rs`), which lets
//! handler and scheduler tests run without a live database.

use super::traits::{
    BucketRepository, ChannelRepository, EpgCacheEntry, EpgCacheRepository, MediaRepository,
    ScheduleBlockRepository,
};
use crate::error::Result;
use crate::models::{Bucket, Channel, ChannelBucketLink, MediaItem, ScheduleBlock};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryChannelRepository {
    channels: RwLock<HashMap<Uuid, Channel>>,
    links: RwLock<HashMap<Uuid, Vec<ChannelBucketLink>>>,
}

impl InMemoryChannelRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_links(&self, channel_id: Uuid, links: Vec<ChannelBucketLink>) {
        self.links.write().unwrap().insert(channel_id, links);
    }
}

#[async_trait]
impl ChannelRepository for InMemoryChannelRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Channel>> {
        Ok(self.channels.read().unwrap().get(&id).cloned())
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Channel>> {
        Ok(self
            .channels
            .read()
            .unwrap()
            .values()
            .find(|c| c.config.slug == slug)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Channel>> {
        Ok(self.channels.read().unwrap().values().cloned().collect())
    }

    async fn upsert(&self, channel: Channel) -> Result<()> {
        self.channels
            .write()
            .unwrap()
            .insert(channel.config.id, channel);
        Ok(())
    }

    async fn channel_bucket_links(&self, channel_id: Uuid) -> Result<Vec<ChannelBucketLink>> {
        Ok(self
            .links
            .read()
            .unwrap()
            .get(&channel_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryBucketRepository {
    buckets: RwLock<HashMap<Uuid, Bucket>>,
}

impl InMemoryBucketRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, bucket: Bucket) {
        self.buckets.write().unwrap().insert(bucket.id, bucket);
    }
}

#[async_trait]
impl BucketRepository for InMemoryBucketRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Bucket>> {
        Ok(self.buckets.read().unwrap().get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Bucket>> {
        Ok(self.buckets.read().unwrap().values().cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryMediaRepository {
    items: RwLock<HashMap<Uuid, MediaItem>>,
}

impl InMemoryMediaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, item: MediaItem) {
        self.items.write().unwrap().insert(item.id, item);
    }
}

#[async_trait]
impl MediaRepository for InMemoryMediaRepository {
    async fn get(&self, id: Uuid) -> Result<Option<MediaItem>> {
        Ok(self.items.read().unwrap().get(&id).cloned())
    }

    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<MediaItem>> {
        let items = self.items.read().unwrap();
        Ok(ids.iter().filter_map(|id| items.get(id).cloned()).collect())
    }
}

#[derive(Default)]
pub struct InMemoryScheduleBlockRepository {
    blocks: RwLock<HashMap<Uuid, Vec<ScheduleBlock>>>,
}

impl InMemoryScheduleBlockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_for_channel(&self, channel_id: Uuid, blocks: Vec<ScheduleBlock>) {
        self.blocks.write().unwrap().insert(channel_id, blocks);
    }
}

#[async_trait]
impl ScheduleBlockRepository for InMemoryScheduleBlockRepository {
    async fn for_channel(&self, channel_id: Uuid) -> Result<Vec<ScheduleBlock>> {
        Ok(self
            .blocks
            .read()
            .unwrap()
            .get(&channel_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryEpgCacheRepository {
    entries: RwLock<HashMap<Uuid, EpgCacheEntry>>,
}

impl InMemoryEpgCacheRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EpgCacheRepository for InMemoryEpgCacheRepository {
    async fn get(&self, channel_id: Uuid) -> Result<Option<EpgCacheEntry>> {
        Ok(self.entries.read().unwrap().get(&channel_id).cloned())
    }

    async fn put(&self, channel_id: Uuid, entry: EpgCacheEntry) -> Result<()> {
        self.entries.write().unwrap().insert(channel_id, entry);
        Ok(())
    }

    async fn invalidate(&self, channel_id: Uuid) -> Result<()> {
        self.entries.write().unwrap().remove(&channel_id);
        Ok(())
    }
}
