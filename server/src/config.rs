//! Server configuration, loaded from the environment (with `.env` support
//! via `dotenvy`) in the shape of the teacher's own `server::config::Config`.

use channelcast_core::config::{CoreConfig, HwAccel, TranscoderPreset};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub database_url: Option<String>,
    pub core: CoreConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

impl Config {
    /// Loads configuration from the process environment, applying `.env`
    /// first if present. Unset variables fall back to `CoreConfig::default()`
    /// and the server's own conservative defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let mut core = CoreConfig::default();

        if let Ok(v) = std::env::var("SEGMENT_DURATION_SECS") {
            core.segment_duration_secs = parse_or_invalid("SEGMENT_DURATION_SECS", &v)?;
        }
        if let Ok(v) = std::env::var("PLAYLIST_WINDOW_SIZE") {
            core.playlist_window_size = parse_or_invalid("PLAYLIST_WINDOW_SIZE", &v)?;
        }
        if let Ok(v) = std::env::var("SEGMENT_MAX_AGE_SECS") {
            core.segment_max_age_secs = parse_or_invalid("SEGMENT_MAX_AGE_SECS", &v)?;
        }
        if let Ok(v) = std::env::var("VIEWER_GRACE_PERIOD_SECS") {
            core.viewer_grace_period_secs = parse_or_invalid("VIEWER_GRACE_PERIOD_SECS", &v)?;
        }
        if let Ok(v) = std::env::var("ENABLE_RESUME_SEEKING") {
            core.enable_resume_seeking = parse_or_invalid("ENABLE_RESUME_SEEKING", &v)?;
        }
        if let Ok(v) = std::env::var("RESUME_SEEK_THRESHOLD_SECS") {
            core.resume_seek_threshold_secs = parse_or_invalid("RESUME_SEEK_THRESHOLD_SECS", &v)?;
        }
        if let Ok(v) = std::env::var("EPG_LOOKAHEAD_HOURS") {
            core.epg_lookahead_hours = parse_or_invalid("EPG_LOOKAHEAD_HOURS", &v)?;
        }
        if let Ok(v) = std::env::var("EPG_CACHE_MINUTES") {
            core.epg_cache_minutes = parse_or_invalid("EPG_CACHE_MINUTES", &v)?;
        }
        if let Ok(v) = std::env::var("EPG_DATABASE_CACHE_MINUTES") {
            core.epg_database_cache_minutes = parse_or_invalid("EPG_DATABASE_CACHE_MINUTES", &v)?;
        }
        if let Ok(v) = std::env::var("TRANSCODER_PRESET") {
            core.transcoder_preset = TranscoderPreset::from_str_lenient(&v);
        }
        if let Ok(v) = std::env::var("HW_ACCEL") {
            core.hw_accel = HwAccel::from_str_lenient(&v);
        }
        if let Ok(v) = std::env::var("MAX_CONCURRENT_STREAMS") {
            core.max_concurrent_streams = parse_or_invalid("MAX_CONCURRENT_STREAMS", &v)?;
        }
        if let Ok(v) = std::env::var("REQUIRE_AUTH") {
            core.require_auth = parse_or_invalid("REQUIRE_AUTH", &v)?;
        }
        if let Ok(v) = std::env::var("ALLOWED_LIBRARY_PATHS") {
            core.allowed_library_paths = v.split(':').map(PathBuf::from).collect();
        }
        if let Ok(v) = std::env::var("FFMPEG_PATH") {
            core.ffmpeg_path = v;
        }

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = match std::env::var("PORT") {
            Ok(v) => parse_or_invalid("PORT", &v)?,
            Err(_) => 8080,
        };
        let database_url = std::env::var("DATABASE_URL").ok();

        Ok(Self {
            host,
            port,
            data_dir,
            database_url,
            core,
        })
    }

    pub fn state_file_path(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }

    pub fn channel_output_dir(&self, slug: &str) -> PathBuf {
        self.data_dir.join("channels").join(slug)
    }
}

fn parse_or_invalid<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            field,
            value: value.to_string(),
        })
}
