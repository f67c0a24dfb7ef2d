use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelState {
    Idle,
    Starting,
    Streaming,
    Transitioning,
    Stopping,
}

/// Persistent channel configuration. Admin-mutated; the core only reads
/// the configuration fields and owns the runtime ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub output_dir: PathBuf,
    pub video_bitrate: String,
    pub audio_bitrate: String,
    pub resolution: (u32, u32),
    pub fps: u32,
    pub segment_duration_secs: u32,
}

/// Runtime metadata for a channel. `schedule_anchor_time` is monotonic for
/// the life of a channel and only advances through the explicit reset
/// operation, exposed as `reset_anchor` for an admin caller to invoke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRuntime {
    pub state: ChannelState,
    pub current_index: usize,
    pub schedule_anchor_time: Option<DateTime<Utc>>,
    pub viewer_count: u32,
    pub last_viewer_seen_at: Option<DateTime<Utc>>,
}

impl Default for ChannelRuntime {
    fn default() -> Self {
        Self {
            state: ChannelState::Idle,
            current_index: 0,
            schedule_anchor_time: None,
            viewer_count: 0,
            last_viewer_seen_at: None,
        }
    }
}

impl ChannelRuntime {
    /// Sets the anchor only if it is not already set, preserving the
    /// monotonicity invariant.
    pub fn ensure_anchor(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        if self.schedule_anchor_time.is_none() {
            self.schedule_anchor_time = Some(now);
        }
        self.schedule_anchor_time.unwrap()
    }

    /// The explicit "reset schedule" admin operation — the only permitted
    /// way to move the anchor.
    pub fn reset_anchor(&mut self, now: DateTime<Utc>) {
        self.schedule_anchor_time = Some(now);
        self.current_index = 0;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub config: ChannelConfig,
    pub runtime: ChannelRuntime,
}
