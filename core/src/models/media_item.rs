use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Immutable descriptor of a single media file, created by the external
/// scanner and metadata extractor. The core only ever reads these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: Uuid,
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub file_size: u64,
    pub codec: Option<String>,
    pub resolution: Option<(u32, u32)>,
    pub fps: Option<f32>,
    pub bitrate: Option<u32>,
    pub show_title: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub episode_title: Option<String>,
}

impl MediaItem {
    /// The title EPG/bumper generation should present to a viewer.
    pub fn display_title(&self) -> String {
        match (&self.show_title, &self.episode_title) {
            (Some(show), Some(title)) => format!("{show} — {title}"),
            (Some(show), None) => show.clone(),
            (None, Some(title)) => title.clone(),
            (None, None) => self
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(show: Option<&str>, ep_title: Option<&str>) -> MediaItem {
        MediaItem {
            id: Uuid::new_v4(),
            path: PathBuf::from("/media/show/ep1.mp4"),
            duration_seconds: 1200.0,
            file_size: 1,
            codec: None,
            resolution: None,
            fps: None,
            bitrate: None,
            show_title: show.map(|s| s.to_string()),
            season: Some(1),
            episode: Some(2),
            episode_title: ep_title.map(|s| s.to_string()),
        }
    }

    #[test]
    fn display_title_falls_back_to_filename() {
        let m = item(None, None);
        assert_eq!(m.display_title(), "ep1");
    }

    #[test]
    fn display_title_prefers_show_and_episode_title() {
        let m = item(Some("Our Show"), Some("Pilot"));
        assert_eq!(m.display_title(), "Our Show — Pilot");
    }
}
