//! Bumper Generator: produces and disk-caches a short "up next" announcement
//! segment, encoded to match the main stream's codec/GOP/sample-rate so it
//! concatenates without re-encoding. Subprocess handling mirrors
//! `TranscoderWorker`'s spawn/drain pattern at a smaller scale.

use crate::error::{CoreError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Hash)]
pub struct BumperRequest {
    pub next_show_name: String,
    pub next_episode_title: Option<String>,
    pub duration_secs: u32,
    pub resolution: (u32, u32),
    pub fps: u32,
    pub video_bitrate: String,
    pub audio_bitrate: String,
    pub out_path: PathBuf,
}

impl BumperRequest {
    fn cache_key(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.next_show_name.hash(&mut hasher);
        self.next_episode_title.hash(&mut hasher);
        self.duration_secs.hash(&mut hasher);
        self.resolution.hash(&mut hasher);
        self.fps.hash(&mut hasher);
        self.video_bitrate.hash(&mut hasher);
        self.audio_bitrate.hash(&mut hasher);
        hasher.finish()
    }
}

struct InFlight {
    abort: tokio::sync::oneshot::Sender<()>,
}

pub struct BumperGenerator {
    ffmpeg_path: String,
    cache_dir: PathBuf,
    in_flight: Arc<Mutex<HashMap<u64, InFlight>>>,
}

impl BumperGenerator {
    pub fn new(ffmpeg_path: impl Into<String>, cache_dir: PathBuf) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            cache_dir,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn cached_path(&self, key: u64) -> PathBuf {
        self.cache_dir.join(format!("bumper_{key:016x}.ts"))
    }

    /// Produces an announcement clip for `request`, writing it to
    /// `request.out_path`. A config hash keys a disk cache; a concurrent call
    /// for the same key kills the in-flight subprocess and restarts it,
    /// since the "next item" may have changed.
    pub async fn produce_up_next(&self, request: BumperRequest) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(CoreError::Io)?;
        let key = request.cache_key();
        let cached = self.cached_path(key);

        if tokio::fs::try_exists(&cached).await.unwrap_or(false) {
            tokio::fs::copy(&cached, &request.out_path)
                .await
                .map_err(CoreError::Io)?;
            return Ok(request.out_path.clone());
        }

        {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(existing) = in_flight.remove(&key) {
                info!(key, "restarting in-flight bumper generation for changed request");
                let _ = existing.abort.send(());
            }
        }

        let (abort_tx, abort_rx) = tokio::sync::oneshot::channel();
        self.in_flight
            .lock()
            .await
            .insert(key, InFlight { abort: abort_tx });

        let result = tokio::time::timeout(
            Duration::from_secs(30),
            run_generation(&self.ffmpeg_path, &request, &cached, abort_rx),
        )
        .await;

        self.in_flight.lock().await.remove(&key);

        match result {
            Ok(Ok(())) => {
                tokio::fs::copy(&cached, &request.out_path)
                    .await
                    .map_err(CoreError::Io)?;
                Ok(request.out_path.clone())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(key, "bumper generation timed out after 30s");
                Err(CoreError::TranscoderSpawn(
                    "bumper generation timed out".to_string(),
                ))
            }
        }
    }
}

async fn run_generation(
    ffmpeg_path: &str,
    request: &BumperRequest,
    cached_path: &Path,
    abort_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<()> {
    let text = match &request.next_episode_title {
        Some(title) => format!("Up Next: {} - {}", request.next_show_name, title),
        None => format!("Up Next: {}", request.next_show_name),
    };
    let drawtext = format!(
        "drawtext=text='{}':fontcolor=white:fontsize=36:x=(w-text_w)/2:y=(h-text_h)/2",
        text.replace('\'', "\\'").replace(':', "\\:")
    );

    let mut cmd = Command::new(ffmpeg_path);
    cmd.arg("-hide_banner")
        .arg("-y")
        .arg("-f")
        .arg("lavfi")
        .arg("-i")
        .arg(format!(
            "color=c=black:s={}x{}:r={}:d={}",
            request.resolution.0, request.resolution.1, request.fps, request.duration_secs
        ))
        .arg("-f")
        .arg("lavfi")
        .arg("-i")
        .arg(format!("anullsrc=r=48000:cl=stereo:d={}", request.duration_secs))
        .arg("-vf")
        .arg(drawtext)
        .arg("-c:v")
        .arg("libx264")
        .arg("-b:v")
        .arg(&request.video_bitrate)
        .arg("-c:a")
        .arg("aac")
        .arg("-b:a")
        .arg(&request.audio_bitrate)
        .arg("-f")
        .arg("mpegts")
        .arg(cached_path);

    let mut child = cmd
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| CoreError::TranscoderSpawn(e.to_string()))?;

    tokio::select! {
        status = child.wait() => {
            let status = status.map_err(|e| CoreError::TranscoderAbnormalExit(e.to_string()))?;
            if !status.success() {
                return Err(CoreError::TranscoderAbnormalExit(format!(
                    "bumper generation exited with {status}"
                )));
            }
            Ok(())
        }
        _ = abort_rx => {
            let _ = child.kill().await;
            Err(CoreError::Conflict("bumper generation superseded by newer request".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_requests_share_a_cache_key() {
        let a = BumperRequest {
            next_show_name: "Our Show".into(),
            next_episode_title: Some("Pilot".into()),
            duration_secs: 10,
            resolution: (1280, 720),
            fps: 30,
            video_bitrate: "2M".into(),
            audio_bitrate: "128k".into(),
            out_path: PathBuf::from("/tmp/a.ts"),
        };
        let mut b = a.clone();
        b.out_path = PathBuf::from("/tmp/b.ts");
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn different_next_item_changes_cache_key() {
        let a = BumperRequest {
            next_show_name: "Our Show".into(),
            next_episode_title: Some("Pilot".into()),
            duration_secs: 10,
            resolution: (1280, 720),
            fps: 30,
            video_bitrate: "2M".into(),
            audio_bitrate: "128k".into(),
            out_path: PathBuf::from("/tmp/a.ts"),
        };
        let mut b = a.clone();
        b.next_episode_title = Some("Episode 2".into());
        assert_ne!(a.cache_key(), b.cache_key());
    }
}
