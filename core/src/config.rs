//! Core-level configuration: the subset of settings that playback and
//! scheduling logic consult directly. The server crate owns its own
//! `Config` (host/port/data dir/ffmpeg path) and builds one of these from
//! it, in the shape of the teacher's `server::config::Config`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HwAccel {
    None,
    Nvenc,
    Qsv,
    VideoToolbox,
}

impl HwAccel {
    pub fn from_str_lenient(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "nvenc" => Self::Nvenc,
            "qsv" => Self::Qsv,
            "videotoolbox" => Self::VideoToolbox,
            _ => Self::None,
        }
    }
}

/// Whitelisted transcoder quality/speed presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TranscoderPreset {
    Ultrafast,
    Veryfast,
    Fast,
    Medium,
    Slow,
}

impl TranscoderPreset {
    pub fn as_ffmpeg_arg(&self) -> &'static str {
        match self {
            Self::Ultrafast => "ultrafast",
            Self::Veryfast => "veryfast",
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
        }
    }

    pub fn from_str_lenient(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "ultrafast" => Self::Ultrafast,
            "veryfast" => Self::Veryfast,
            "fast" => Self::Fast,
            "slow" => Self::Slow,
            _ => Self::Medium,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    pub segment_duration_secs: u32,
    pub playlist_window_size: usize,
    pub segment_max_age_secs: u64,
    pub viewer_grace_period_secs: u64,
    pub enable_resume_seeking: bool,
    pub resume_seek_threshold_secs: f64,
    pub epg_lookahead_hours: u32,
    pub epg_cache_minutes: u32,
    pub epg_database_cache_minutes: u32,
    pub transcoder_preset: TranscoderPreset,
    pub hw_accel: HwAccel,
    pub max_concurrent_streams: usize,
    pub require_auth: bool,
    pub allowed_library_paths: Vec<PathBuf>,
    pub ffmpeg_path: String,
}

impl CoreConfig {
    pub fn viewer_grace_period(&self) -> Duration {
        Duration::from_secs(self.viewer_grace_period_secs)
    }

    pub fn segment_max_age(&self) -> Duration {
        Duration::from_secs(self.segment_max_age_secs)
    }

    pub fn gop_size(&self, fps: u32) -> u32 {
        fps * self.segment_duration_secs
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            segment_duration_secs: 6,
            playlist_window_size: 30,
            segment_max_age_secs: 600,
            viewer_grace_period_secs: 45,
            enable_resume_seeking: true,
            resume_seek_threshold_secs: 2.0,
            epg_lookahead_hours: 48,
            epg_cache_minutes: 5,
            epg_database_cache_minutes: 120,
            transcoder_preset: TranscoderPreset::Veryfast,
            hw_accel: HwAccel::None,
            max_concurrent_streams: 8,
            require_auth: false,
            allowed_library_paths: Vec::new(),
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}
