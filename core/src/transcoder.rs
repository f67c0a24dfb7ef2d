//! Transcoder Worker: launches and supervises one ffmpeg subprocess per
//! active channel, in the style of the teacher's
//! `stream::transcoding::worker::WorkerPool` — a `tokio::process::Command`
//! spawned per job, stderr drained line-by-line on a dedicated task, and
//! subprocess exit mapped onto a small lifecycle event enum.

use crate::config::CoreConfig;
use crate::error::{CoreError, Result};
use crate::models::InputDescriptor;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

#[derive(Debug, Clone)]
pub struct WatermarkSpec {
    pub image_path: PathBuf,
    pub corner: Corner,
    pub padding_px: u32,
}

/// Everything the worker needs to assemble an ffmpeg invocation for one run.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub channel_id: Uuid,
    pub input: InputDescriptor,
    pub output_dir: PathBuf,
    pub video_bitrate: String,
    pub audio_bitrate: String,
    pub resolution: (u32, u32),
    pub fps: u32,
    pub segment_duration_secs: u32,
    pub watermark: Option<WatermarkSpec>,
}

impl RunSpec {
    fn playlist_path(&self) -> PathBuf {
        self.output_dir.join("stream.m3u8")
    }

    fn starting_placeholder_path(&self) -> PathBuf {
        self.output_dir.join(".starting")
    }
}

#[derive(Debug, Clone)]
pub enum TranscoderEvent {
    /// Natural EOF of the input: triggers the scheduler's transition logic.
    ItemEnd { channel_id: Uuid },
    /// Non-zero exit not initiated by `Stop`.
    AbnormalExit { channel_id: Uuid, message: String },
    SpawnFailed { channel_id: Uuid, message: String },
}

struct ActiveRun {
    pid: u32,
    started_at: Instant,
    stopped_by_us: Arc<AtomicBool>,
    exited: Arc<tokio::sync::Notify>,
}

/// Patterns ffmpeg emits on stderr that are noisy but not actionable;
/// demoted to `debug!` and rate-limited within a 5s window.
const BENIGN_STDERR_PATTERNS: &[&str] = &[
    "deprecated pixel format",
    "Past duration",
    "non-monotonic",
    "no frame!",
];

pub struct TranscoderWorker {
    runs: Arc<Mutex<HashMap<Uuid, ActiveRun>>>,
    ffmpeg_path: String,
}

impl TranscoderWorker {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            runs: Arc::new(Mutex::new(HashMap::new())),
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    pub async fn is_active(&self, channel_id: Uuid) -> bool {
        self.runs.lock().await.contains_key(&channel_id)
    }

    /// Starts (or restarts) the transcoder for `spec.channel_id`, polling the
    /// on-disk playlist for evidence of progress before returning.
    pub async fn start(&self, spec: RunSpec, events: mpsc::Sender<TranscoderEvent>) -> Result<()> {
        let channel_id = spec.channel_id;

        if self.is_active(channel_id).await {
            self.stop(channel_id).await?;
            tokio::time::sleep(Duration::from_millis(200)).await;
        }

        tokio::fs::create_dir_all(&spec.output_dir)
            .await
            .map_err(CoreError::Io)?;
        let _ = tokio::fs::remove_file(spec.starting_placeholder_path()).await;

        match &spec.input {
            InputDescriptor::SingleFile { path, .. } => {
                if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                    let msg = format!("input not found: {}", path.display());
                    let _ = events
                        .send(TranscoderEvent::SpawnFailed {
                            channel_id,
                            message: msg.clone(),
                        })
                        .await;
                    return Err(CoreError::InputNotFound(msg));
                }
            }
            InputDescriptor::ConcatManifest { manifest_path } => {
                let contents = tokio::fs::read_to_string(manifest_path)
                    .await
                    .map_err(CoreError::Io)?;
                if contents.trim().is_empty() {
                    let msg = format!("empty concat manifest: {}", manifest_path.display());
                    let _ = events
                        .send(TranscoderEvent::SpawnFailed {
                            channel_id,
                            message: msg.clone(),
                        })
                        .await;
                    return Err(CoreError::ConcatInvalid(msg));
                }
            }
        }

        let baseline = read_highest_segment_number(&spec.playlist_path()).await;
        let is_transition = baseline.is_some();
        let start_number = baseline.map(|n| n + 1).unwrap_or(0);

        let mut cmd = build_ffmpeg_command(&self.ffmpeg_path, &spec, start_number);
        info!(%channel_id, ?cmd, "spawning transcoder");

        let mut child = cmd
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| CoreError::TranscoderSpawn(e.to_string()))?;

        let pid = child.id().ok_or_else(|| {
            CoreError::TranscoderSpawn("spawned child has no pid".to_string())
        })?;

        let stopped_by_us = Arc::new(AtomicBool::new(false));
        let exited = Arc::new(tokio::sync::Notify::new());

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(channel_id, stderr));
        }

        spawn_exit_watcher(
            channel_id,
            child,
            stopped_by_us.clone(),
            exited.clone(),
            events.clone(),
        );

        self.runs.lock().await.insert(
            channel_id,
            ActiveRun {
                pid,
                started_at: Instant::now(),
                stopped_by_us,
                exited,
            },
        );

        let timeout = if is_transition {
            Duration::from_secs(35)
        } else {
            Duration::from_secs(45)
        };
        let poll_success = poll_playlist_progress(&spec.playlist_path(), baseline, timeout).await;
        if !poll_success {
            warn!(%channel_id, "transcoder did not report progress within timeout; handle remains active");
        }

        Ok(())
    }

    /// SIGTERM, wait up to 5s, then SIGKILL. Returns once the subprocess has
    /// been reaped.
    pub async fn stop(&self, channel_id: Uuid) -> Result<()> {
        let (pid, stopped_by_us, exited) = {
            let runs = self.runs.lock().await;
            match runs.get(&channel_id) {
                Some(run) => (run.pid, run.stopped_by_us.clone(), run.exited.clone()),
                None => return Ok(()),
            }
        };

        stopped_by_us.store(true, Ordering::SeqCst);
        send_signal(pid, Signal::Term);

        let reaped = tokio::time::timeout(Duration::from_secs(5), exited.notified())
            .await
            .is_ok();
        if !reaped {
            warn!(%channel_id, pid, "transcoder did not exit after SIGTERM, sending SIGKILL");
            send_signal(pid, Signal::Kill);
            let _ = tokio::time::timeout(Duration::from_secs(2), exited.notified()).await;
        }

        self.runs.lock().await.remove(&channel_id);
        Ok(())
    }

    /// The highest segment number currently written to `output_dir`'s
    /// playlist, or 0 if there is no playlist yet. Used by callers that need
    /// to know where the *next* run's segments will start numbering from,
    /// e.g. to place a discontinuity marker at the first segment of a run.
    pub async fn current_highest_segment(&self, output_dir: &Path) -> u64 {
        read_highest_segment_number(&output_dir.join("stream.m3u8"))
            .await
            .unwrap_or(0)
    }

    /// Best-effort scan for leaked transcoder processes referencing
    /// `output_dir` in their command line; terminated SIGTERM → 2s → SIGKILL.
    /// Linux-only (reads `/proc`); a no-op elsewhere.
    pub async fn kill_orphans(&self, output_dir: &Path) -> usize {
        #[cfg(target_os = "linux")]
        {
            kill_orphans_linux(output_dir).await
        }
        #[cfg(not(target_os = "linux"))]
        {
            let _ = output_dir;
            0
        }
    }
}

#[derive(Clone, Copy)]
enum Signal {
    Term,
    Kill,
}

fn send_signal(pid: u32, signal: Signal) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal as NixSignal};
        use nix::unistd::Pid;
        let sig = match signal {
            Signal::Term => NixSignal::SIGTERM,
            Signal::Kill => NixSignal::SIGKILL,
        };
        if let Err(e) = kill(Pid::from_raw(pid as i32), sig) {
            debug!(pid, error = %e, "signal delivery failed (process likely already gone)");
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (pid, signal);
    }
}

fn spawn_exit_watcher(
    channel_id: Uuid,
    mut child: Child,
    stopped_by_us: Arc<AtomicBool>,
    exited: Arc<tokio::sync::Notify>,
    events: mpsc::Sender<TranscoderEvent>,
) {
    tokio::spawn(async move {
        let status = child.wait().await;
        exited.notify_waiters();

        if stopped_by_us.load(Ordering::SeqCst) {
            info!(%channel_id, "transcoder stopped as requested");
            return;
        }

        match status {
            Ok(status) if status.success() => {
                info!(%channel_id, "transcoder reached end of input");
                let _ = events.send(TranscoderEvent::ItemEnd { channel_id }).await;
            }
            Ok(status) => {
                let message = format!("transcoder exited abnormally: {status}");
                error!(%channel_id, %message);
                let _ = events
                    .send(TranscoderEvent::AbnormalExit {
                        channel_id,
                        message,
                    })
                    .await;
                tokio::time::sleep(Duration::from_secs(1)).await;
                let _ = events.send(TranscoderEvent::ItemEnd { channel_id }).await;
            }
            Err(e) => {
                let message = format!("failed to reap transcoder: {e}");
                error!(%channel_id, %message);
                let _ = events
                    .send(TranscoderEvent::AbnormalExit {
                        channel_id,
                        message,
                    })
                    .await;
            }
        }
    });
}

async fn drain_stderr(channel_id: Uuid, stderr: tokio::process::ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    let mut benign_seen = HashMap::<&'static str, (Instant, u32)>::new();

    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(pattern) = BENIGN_STDERR_PATTERNS.iter().find(|p| line.contains(**p)) {
            let entry = benign_seen.entry(pattern).or_insert((Instant::now(), 0));
            entry.1 += 1;
            let is_first = entry.1 == 1;
            let window_elapsed = entry.0.elapsed() > Duration::from_secs(5);
            if is_first || (entry.1 % 50 == 0) || window_elapsed {
                trace!(%channel_id, %line, "benign transcoder warning");
            }
            if window_elapsed {
                *entry = (Instant::now(), 0);
            }
            continue;
        }

        if line.contains("[error]") || line.contains("Error") {
            error!(%channel_id, %line, "transcoder stderr");
        } else if line.contains("[warning]") || line.contains("Warning") {
            warn!(%channel_id, %line, "transcoder stderr");
        } else {
            debug!(%channel_id, %line, "transcoder stderr");
        }
    }
}

async fn poll_playlist_progress(
    playlist_path: &Path,
    baseline: Option<u64>,
    timeout: Duration,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(highest) = read_highest_segment_number(playlist_path).await {
            match baseline {
                Some(base) if highest > base => return true,
                None => return true,
                _ => {}
            }
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

/// Highest segment number referenced by the playlist, parsed from segment
/// filenames of the form `stream_NNN.ts`/`stream_NNN.m4s`. `None` if the
/// file is missing, empty, or has no segment references yet.
async fn read_highest_segment_number(playlist_path: &Path) -> Option<u64> {
    let contents = tokio::fs::read_to_string(playlist_path).await.ok()?;
    contents
        .lines()
        .filter(|l| !l.starts_with('#') && !l.trim().is_empty())
        .filter_map(parse_segment_number)
        .max()
}

fn parse_segment_number(segment_line: &str) -> Option<u64> {
    let stem = Path::new(segment_line.trim()).file_stem()?.to_str()?;
    stem.rsplit('_').next()?.parse::<u64>().ok()
}

/// `start_number` continues the playlist's segment numbering across worker
/// restarts/transitions; ffmpeg's HLS muxer otherwise numbers every fresh
/// process from 0.
fn build_ffmpeg_command(ffmpeg_path: &str, spec: &RunSpec, start_number: u64) -> Command {
    let mut cmd = Command::new(ffmpeg_path);
    cmd.arg("-hide_banner").arg("-y").arg("-re");

    match &spec.input {
        InputDescriptor::SingleFile {
            path,
            start_position_secs,
        } => {
            if let Some(pos) = start_position_secs {
                cmd.arg("-ss").arg(pos.to_string());
            }
            cmd.arg("-i").arg(path);
        }
        InputDescriptor::ConcatManifest { manifest_path } => {
            cmd.arg("-f")
                .arg("concat")
                .arg("-safe")
                .arg("0")
                .arg("-i")
                .arg(manifest_path);
        }
    }

    if let Some(watermark) = &spec.watermark {
        let overlay = match watermark.corner {
            Corner::TopLeft => format!("{p}:{p}", p = watermark.padding_px),
            Corner::TopRight => format!("W-w-{p}:{p}", p = watermark.padding_px),
            Corner::BottomLeft => format!("{p}:H-h-{p}", p = watermark.padding_px),
            Corner::BottomRight => format!("W-w-{p}:H-h-{p}", p = watermark.padding_px),
        };
        cmd.arg("-i").arg(&watermark.image_path);
        cmd.arg("-filter_complex")
            .arg(format!("overlay={overlay}"));
    }

    let gop = spec.fps * spec.segment_duration_secs;
    cmd.arg("-c:v")
        .arg("libx264")
        .arg("-b:v")
        .arg(&spec.video_bitrate)
        .arg("-r")
        .arg(spec.fps.to_string())
        .arg("-g")
        .arg(gop.to_string())
        .arg("-keyint_min")
        .arg(gop.to_string())
        .arg("-force_key_frames")
        .arg(format!("expr:gte(t,n_forced*{})", spec.segment_duration_secs))
        .arg("-s")
        .arg(format!("{}x{}", spec.resolution.0, spec.resolution.1))
        .arg("-c:a")
        .arg("aac")
        .arg("-ar")
        .arg("48000")
        .arg("-ac")
        .arg("2")
        .arg("-b:a")
        .arg(&spec.audio_bitrate)
        .arg("-f")
        .arg("hls")
        .arg("-hls_time")
        .arg(spec.segment_duration_secs.to_string())
        .arg("-hls_list_size")
        .arg("30")
        .arg("-hls_flags")
        .arg("append_list+omit_endlist+temp_file")
        .arg("-hls_segment_type")
        .arg("mpegts")
        .arg("-start_number")
        .arg(start_number.to_string())
        .arg("-hls_segment_filename")
        .arg(spec.output_dir.join("stream_%05d.ts"))
        .arg(spec.playlist_path());

    cmd
}

#[cfg(target_os = "linux")]
async fn kill_orphans_linux(output_dir: &Path) -> usize {
    let marker = output_dir.to_string_lossy().to_string();
    let mut killed = 0usize;

    let mut entries = match tokio::fs::read_dir("/proc").await {
        Ok(e) => e,
        Err(_) => return 0,
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let pid: u32 = match entry.file_name().to_str().and_then(|s| s.parse().ok()) {
            Some(p) => p,
            None => continue,
        };
        let cmdline_path = entry.path().join("cmdline");
        let cmdline = match tokio::fs::read(&cmdline_path).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).replace('\0', " "),
            Err(_) => continue,
        };
        if cmdline.contains("ffmpeg") && cmdline.contains(&marker) {
            warn!(pid, dir = %marker, "killing orphaned transcoder");
            send_signal(pid, Signal::Term);
            tokio::time::sleep(Duration::from_secs(2)).await;
            send_signal(pid, Signal::Kill);
            killed += 1;
        }
    }

    killed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_segment_number_from_ts_filename() {
        assert_eq!(parse_segment_number("stream_00042.ts"), Some(42));
    }

    #[test]
    fn parses_segment_number_from_m4s_filename() {
        assert_eq!(parse_segment_number("stream_00007.m4s"), Some(7));
    }

    #[test]
    fn rejects_non_segment_lines() {
        assert_eq!(parse_segment_number("#EXTINF:6.0,"), None);
    }

    #[tokio::test]
    async fn missing_playlist_has_no_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.m3u8");
        assert_eq!(read_highest_segment_number(&path).await, None);
    }

    #[tokio::test]
    async fn reads_highest_segment_number_from_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.m3u8");
        tokio::fs::write(
            &path,
            "#EXTM3U\n#EXTINF:6.0,\nstream_00001.ts\n#EXTINF:6.0,\nstream_00002.ts\n",
        )
        .await
        .unwrap();
        assert_eq!(read_highest_segment_number(&path).await, Some(2));
    }
}
