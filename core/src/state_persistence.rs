//! State Persistence: periodically snapshots per-channel playback position
//! to disk so a restart can resume close to where it left off, with the EPG
//! Projector as the higher-trust recovery source the scheduler consults
//! first (see `epg::EpgProjector::position_for_current_program`). This is
//! the fallback.

use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedChannelState {
    pub channel_id: Uuid,
    pub current_index: usize,
    pub schedule_anchor_time: Option<DateTime<Utc>>,
    pub was_streaming: bool,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Snapshot {
    channels: Vec<PersistedChannelState>,
}

pub struct StatePersistence {
    primary_path: PathBuf,
    backup_path: PathBuf,
}

impl StatePersistence {
    pub fn new(primary_path: PathBuf) -> Self {
        let backup_path = primary_path.with_extension("bak");
        Self {
            primary_path,
            backup_path,
        }
    }

    /// Loads persisted state at startup. Falls back to the backup copy if
    /// the primary is missing or unreadable (e.g. truncated by a crash
    /// mid-write); restored channels are not auto-started here, only
    /// reported so the caller can leave them `Idle` until a viewer arrives.
    pub async fn load(&self) -> Result<Vec<PersistedChannelState>> {
        match self.read_snapshot(&self.primary_path).await {
            Ok(snapshot) => Ok(snapshot.channels),
            Err(e) => {
                warn!(error = %e, "primary state file unreadable, trying backup");
                match self.read_snapshot(&self.backup_path).await {
                    Ok(snapshot) => Ok(snapshot.channels),
                    Err(_) => {
                        info!("no usable persisted state found, starting fresh");
                        Ok(Vec::new())
                    }
                }
            }
        }
    }

    async fn read_snapshot(&self, path: &Path) -> Result<Snapshot> {
        let bytes = tokio::fs::read(path).await.map_err(CoreError::Io)?;
        serde_json::from_slice(&bytes).map_err(CoreError::Serialization)
    }

    /// Atomically persists `channels`: write to a temp file, back up the
    /// previous snapshot (if any), then rename the temp file into place.
    pub async fn save(&self, channels: &[PersistedChannelState]) -> Result<()> {
        let snapshot = Snapshot {
            channels: channels.to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&snapshot).map_err(CoreError::Serialization)?;

        if let Some(parent) = self.primary_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(CoreError::Io)?;
        }

        let tmp_path = self.primary_path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &bytes).await.map_err(CoreError::Io)?;

        if tokio::fs::try_exists(&self.primary_path).await.unwrap_or(false) {
            tokio::fs::copy(&self.primary_path, &self.backup_path)
                .await
                .map_err(CoreError::Io)?;
        }

        tokio::fs::rename(&tmp_path, &self.primary_path)
            .await
            .map_err(CoreError::Io)?;
        Ok(())
    }

    /// Spawns the 60-second periodic snapshot loop. `collect` is called
    /// each tick to gather the current state from whatever owns it (the
    /// scheduler); errors are logged and do not stop the loop, since a
    /// single failed snapshot shouldn't give up on future ones.
    pub fn spawn_periodic_snapshot<F, Fut>(self: std::sync::Arc<Self>, collect: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Vec<PersistedChannelState>> + Send,
    {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                let channels = collect().await;
                if let Err(e) = self.save(&channels).await {
                    warn!(error = %e, "periodic state snapshot failed");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(channel_id: Uuid, index: usize) -> PersistedChannelState {
        PersistedChannelState {
            channel_id,
            current_index: index,
            schedule_anchor_time: Some(Utc::now()),
            was_streaming: true,
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = StatePersistence::new(dir.path().join("state.json"));
        let channel_id = Uuid::new_v4();
        persistence.save(&[state(channel_id, 3)]).await.unwrap();

        let loaded = persistence.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].channel_id, channel_id);
        assert_eq!(loaded[0].current_index, 3);
    }

    #[tokio::test]
    async fn missing_primary_falls_back_to_backup() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = StatePersistence::new(dir.path().join("state.json"));
        let channel_id = Uuid::new_v4();

        persistence.save(&[state(channel_id, 1)]).await.unwrap();
        persistence.save(&[state(channel_id, 2)]).await.unwrap();
        // Corrupt the primary but leave the backup (which holds index=1) intact.
        tokio::fs::write(&persistence.primary_path, b"not json")
            .await
            .unwrap();

        let loaded = persistence.load().await.unwrap();
        assert_eq!(loaded[0].current_index, 1);
    }

    #[tokio::test]
    async fn no_files_returns_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = StatePersistence::new(dir.path().join("state.json"));
        let loaded = persistence.load().await.unwrap();
        assert!(loaded.is_empty());
    }
}
