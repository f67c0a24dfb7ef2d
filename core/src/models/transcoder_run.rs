use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

/// One of the inputs a `RunSpec` drives the transcoder with.
#[derive(Debug, Clone)]
pub enum InputDescriptor {
    SingleFile {
        path: PathBuf,
        start_position_secs: Option<f64>,
    },
    ConcatManifest { manifest_path: PathBuf },
}

/// Ephemeral record held only while a transcoder subprocess is alive.
/// Owned exclusively by the Transcoder Worker.
#[derive(Debug, Clone)]
pub struct TranscoderRun {
    pub channel_id: Uuid,
    pub input: InputDescriptor,
    pub start_position_secs: f64,
    pub started_at: Instant,
    pub pid: u32,
}
