use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketKind {
    Global,
    ChannelSpecific,
}

/// A named, ordered, deduplicated collection of `MediaItem` ids. Mutated
/// only by admin operations (out of scope); the core only reads these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub id: Uuid,
    pub name: String,
    pub kind: BucketKind,
    /// Media ids in persisted position order. Deduplicated at the point of
    /// admin mutation, so the core can assume uniqueness here.
    pub media_ids: Vec<Uuid>,
}

/// A channel's link to one of its buckets, with the priority used to order
/// the fallback concatenation in `Resolver::resolve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelBucketLink {
    pub bucket_id: Uuid,
    pub priority: i32,
}
