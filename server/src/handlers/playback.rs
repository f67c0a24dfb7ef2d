//! Playback surface: playlist and segment delivery for a channel identified
//! by its slug. Every request here also counts as viewer activity for C7.

use crate::errors::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use channelcast_core::viewer::RequestKind;

const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

async fn resolve_channel(
    state: &AppState,
    slug: &str,
) -> Result<channelcast_core::models::Channel, ApiError> {
    state
        .channel_repo
        .get_by_slug(slug)
        .await
        .map_err(|e| ApiError::from_core(e, &[state.config.data_dir.clone()]))?
        .ok_or_else(|| ApiError::not_found(format!("unknown channel: {slug}")))
}

pub async fn master_playlist(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    stream_playlist(state, slug).await
}

pub async fn media_playlist(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    stream_playlist(state, slug).await
}

async fn stream_playlist(state: AppState, slug: String) -> Result<Response, ApiError> {
    let channel = resolve_channel(&state, &slug).await?;
    state
        .viewer_tracker
        .note_request(channel.config.id, RequestKind::Playlist)
        .await;
    state.scheduler.clone().ensure_spawned(channel.config.id).await;

    let playlist_path = channel.config.output_dir.join("stream.m3u8");
    let text = state
        .hls
        .get_playlist(
            channel.config.id,
            &playlist_path,
            channel.config.segment_duration_secs,
        )
        .await;

    Ok(([(header::CONTENT_TYPE, PLAYLIST_CONTENT_TYPE)], text).into_response())
}

pub async fn segment(
    State(state): State<AppState>,
    Path((slug, file_name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let channel = resolve_channel(&state, &slug).await?;
    state
        .viewer_tracker
        .note_request(channel.config.id, RequestKind::Segment)
        .await;

    let path = channel.config.output_dir.join(&file_name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let content_type = if file_name.ends_with(".m4s") || file_name.ends_with(".mp4") {
                "video/iso.segment"
            } else {
                "video/mp2t"
            };
            Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
        }
        Err(_) => Ok((StatusCode::NOT_FOUND, "").into_response()),
    }
}

pub async fn init_segment(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let channel = resolve_channel(&state, &slug).await?;
    let path = channel.config.output_dir.join("init.mp4");
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, "video/mp4")], bytes).into_response()),
        Err(_) => Ok((StatusCode::NOT_FOUND, "").into_response()),
    }
}
