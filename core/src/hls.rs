//! HLS Playlist Service: serves the current on-disk playlist verbatim
//! except for read-time discontinuity-marker injection, and a minimal
//! placeholder while the transcoder warms up. Injection happens at read
//! time (never write time) because the transcoder owns the playlist file;
//! see the rationale in the scheduler/transcoder split.

use crate::models::TransitionMarkers;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const DISCONTINUITY_TAG: &str = "#EXT-X-DISCONTINUITY";

pub struct HlsPlaylistService {
    markers: Arc<Mutex<HashMap<Uuid, TransitionMarkers>>>,
}

impl Default for HlsPlaylistService {
    fn default() -> Self {
        Self::new()
    }
}

impl HlsPlaylistService {
    pub fn new() -> Self {
        Self {
            markers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn record_transition(&self, channel_id: Uuid, segment_number: u64) {
        self.markers
            .lock()
            .await
            .entry(channel_id)
            .or_default()
            .record(segment_number);
    }

    pub async fn clear_transition(&self, channel_id: Uuid, segment_number: u64) {
        if let Some(markers) = self.markers.lock().await.get_mut(&channel_id) {
            markers.clear(segment_number);
        }
    }

    /// Returns the playlist text to serve for `channel_id`, injecting any
    /// still-pending discontinuity markers and then clearing them (a marker
    /// is removed only once it has actually been served).
    pub async fn get_playlist(
        &self,
        channel_id: Uuid,
        playlist_path: &Path,
        segment_duration_secs: u32,
    ) -> String {
        let contents = tokio::fs::read_to_string(playlist_path).await.ok();
        let Some(contents) = contents.filter(|c| c.contains("#EXTM3U")) else {
            return placeholder_playlist(segment_duration_secs);
        };

        let pending = {
            let markers = self.markers.lock().await;
            markers
                .get(&channel_id)
                .map(|m| m.current().clone())
                .unwrap_or_default()
        };
        if pending.is_empty() {
            return contents;
        }

        let (rendered, served) = inject_discontinuities(&contents, &pending);

        if let Some(markers) = self.markers.lock().await.get_mut(&channel_id) {
            for segment_number in &served {
                markers.clear(*segment_number);
            }
        }

        rendered
    }
}

fn placeholder_playlist(segment_duration_secs: u32) -> String {
    format!(
        "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:{segment_duration_secs}\n#EXT-X-MEDIA-SEQUENCE:0\n#EXT-X-PLAYLIST-TYPE:EVENT\n"
    )
}

fn parse_segment_number(segment_line: &str) -> Option<u64> {
    let stem = Path::new(segment_line.trim()).file_stem()?.to_str()?;
    stem.rsplit('_').next()?.parse::<u64>().ok()
}

/// Inserts `#EXT-X-DISCONTINUITY` immediately before the `#EXTINF` line of
/// each segment whose number is in `pending`, unless already present.
/// Returns the rendered playlist plus the set of segment numbers that were
/// actually found and marked (the caller clears only those).
fn inject_discontinuities(
    contents: &str,
    pending: &std::collections::HashSet<u64>,
) -> (String, Vec<u64>) {
    let lines: Vec<&str> = contents.lines().collect();
    let mut out = String::with_capacity(contents.len() + 32 * pending.len());
    let mut served = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if line.starts_with("#EXTINF") {
            if let Some(segment_line) = lines.get(i + 1) {
                if let Some(segment_number) = parse_segment_number(segment_line) {
                    if pending.contains(&segment_number) {
                        let already_marked =
                            i > 0 && lines[i - 1].trim() == DISCONTINUITY_TAG;
                        if !already_marked {
                            out.push_str(DISCONTINUITY_TAG);
                            out.push('\n');
                        }
                        served.push(segment_number);
                    }
                }
            }
        }
        out.push_str(line);
        out.push('\n');
        i += 1;
    }

    (out, served)
}

pub struct SegmentFileResolver;

impl SegmentFileResolver {
    /// The segment file path for `segment_number` under `output_dir`, for
    /// the caller to stream back (404 on missing, non-error for clients).
    pub fn segment_path(output_dir: &Path, segment_number: u64, extension: &str) -> PathBuf {
        output_dir.join(format!("stream_{segment_number:05}.{extension}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_returns_placeholder() {
        let service = HlsPlaylistService::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.m3u8");
        let out = service.get_playlist(Uuid::new_v4(), &path, 6).await;
        assert!(out.contains("#EXT-X-TARGETDURATION:6"));
        assert!(!out.contains("EXTINF"));
    }

    #[tokio::test]
    async fn injects_discontinuity_before_marked_segment() {
        let service = HlsPlaylistService::new();
        let channel_id = Uuid::new_v4();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.m3u8");
        tokio::fs::write(
            &path,
            "#EXTM3U\n#EXT-X-VERSION:3\n#EXTINF:6.0,\nstream_00001.ts\n#EXTINF:6.0,\nstream_00002.ts\n",
        )
        .await
        .unwrap();

        service.record_transition(channel_id, 2).await;
        let out = service.get_playlist(channel_id, &path, 6).await;

        let lines: Vec<&str> = out.lines().collect();
        let seg2_idx = lines.iter().position(|l| *l == "stream_00002.ts").unwrap();
        assert_eq!(lines[seg2_idx - 2], DISCONTINUITY_TAG);
    }

    #[tokio::test]
    async fn marker_served_once_is_not_repeated() {
        let service = HlsPlaylistService::new();
        let channel_id = Uuid::new_v4();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.m3u8");
        tokio::fs::write(
            &path,
            "#EXTM3U\n#EXTINF:6.0,\nstream_00001.ts\n#EXTINF:6.0,\nstream_00002.ts\n",
        )
        .await
        .unwrap();

        service.record_transition(channel_id, 2).await;
        let first = service.get_playlist(channel_id, &path, 6).await;
        let second = service.get_playlist(channel_id, &path, 6).await;

        assert_eq!(first.matches(DISCONTINUITY_TAG).count(), 1);
        assert_eq!(second.matches(DISCONTINUITY_TAG).count(), 0);
    }
}
