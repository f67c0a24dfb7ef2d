//! EPG surface: a single combined XMLTV document across all channels.

use crate::errors::ApiError;
use crate::state::AppState;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use channelcast_core::epg::render_xmltv;

pub async fn epg_xml(State(state): State<AppState>) -> Result<Response, ApiError> {
    let channels = state
        .channel_repo
        .list()
        .await
        .map_err(|e| ApiError::from_core(e, &[state.config.data_dir.clone()]))?;

    let mut channel_programs = Vec::with_capacity(channels.len());
    let mut programs_by_channel = Vec::with_capacity(channels.len());
    let mut display_names = std::collections::HashMap::new();

    for channel in &channels {
        let programs = state
            .epg
            .programs(channel.config.id)
            .await
            .map_err(|e| ApiError::from_core(e, &[state.config.data_dir.clone()]))?;
        display_names.insert(channel.config.id, channel.config.name.clone());
        programs_by_channel.push((channel.config.id, programs));
    }
    for (channel_id, programs) in &programs_by_channel {
        channel_programs.push((*channel_id, programs));
    }

    let xml = render_xmltv(&channel_programs, &display_names);
    Ok(([(header::CONTENT_TYPE, "application/xml")], xml).into_response())
}
