use thiserror::Error;

/// Error kinds produced by the scheduling/playback core.
///
/// Request validation is rejected before it ever reaches the core, and a
/// missing playlist or empty schedule is handled as an `Option`/placeholder
/// value rather than a variant here; everything else is surfaced to the
/// HTTP edge by the server crate (see `server::errors`).
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("media item not found: {0}")]
    MediaNotFound(String),

    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("failed to spawn transcoder: {0}")]
    TranscoderSpawn(String),

    #[error("transcoder exited abnormally: {0}")]
    TranscoderAbnormalExit(String),

    #[error("input not found: {0}")]
    InputNotFound(String),

    #[error("invalid concat manifest: {0}")]
    ConcatInvalid(String),

    #[error("repository unavailable: {0}")]
    RepositoryUnavailable(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Replaces filesystem paths in an error message with a placeholder before
/// it is allowed to cross the API boundary. Matches both Unix (`/a/b/c`)
/// and Windows-style (`C:\a\b`) absolute paths.
pub fn sanitize_message(message: &str, known_base_paths: &[std::path::PathBuf]) -> String {
    let mut sanitized = message.to_string();
    for base in known_base_paths {
        if let Some(base_str) = base.to_str() {
            if !base_str.is_empty() {
                sanitized = sanitized.replace(base_str, "<path>");
            }
        }
    }
    let unix_path = regex::Regex::new(r"/[A-Za-z0-9_./\-]+").unwrap();
    let windows_path = regex::Regex::new(r"[A-Za-z]:\\[A-Za-z0-9_.\\\-]+").unwrap();
    let sanitized = unix_path.replace_all(&sanitized, "<path>");
    let sanitized = windows_path.replace_all(&sanitized, "<path>");
    sanitized.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_unix_paths() {
        let msg = "could not open /var/lib/channelcast/media/show.mp4";
        let out = sanitize_message(msg, &[]);
        assert!(!out.contains("/var/lib"));
        assert!(out.contains("<path>"));
    }

    #[test]
    fn sanitizes_windows_paths() {
        let msg = r"could not open C:\media\show.mkv";
        let out = sanitize_message(msg, &[]);
        assert!(!out.contains(r"C:\media"));
    }

    #[test]
    fn sanitizes_known_base_path_first() {
        let msg = "failed: /data/channels/1/output/stream_001.ts not found";
        let base = std::path::PathBuf::from("/data/channels/1/output");
        let out = sanitize_message(msg, &[base]);
        assert!(out.contains("<path>"));
    }
}
