//! Smoke tests for the ambient HTTP surface, in the style of the teacher's
//! own `test_ping_endpoint`: exercise the router directly with `oneshot`
//! rather than binding a real socket.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use channelcast_core::bumper::BumperGenerator;
use channelcast_core::epg::EpgProjector;
use channelcast_core::hls::HlsPlaylistService;
use channelcast_core::repositories::memory::{
    InMemoryBucketRepository, InMemoryChannelRepository, InMemoryEpgCacheRepository,
    InMemoryMediaRepository, InMemoryScheduleBlockRepository,
};
use channelcast_core::scheduler::ChannelScheduler;
use channelcast_core::state_persistence::StatePersistence;
use channelcast_core::transcoder::TranscoderWorker;
use channelcast_core::viewer::ViewerSessionTracker;
use channelcast_server::{config, create_app, state};
use std::sync::Arc;
use tower::ServiceExt;

fn test_state(data_dir: &std::path::Path) -> state::AppState {
    let cfg = config::Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        data_dir: data_dir.to_path_buf(),
        database_url: None,
        core: channelcast_core::config::CoreConfig::default(),
    };
    let config = Arc::new(cfg);

    let channel_repo: Arc<dyn channelcast_core::repositories::ChannelRepository> =
        Arc::new(InMemoryChannelRepository::default());
    let bucket_repo: Arc<dyn channelcast_core::repositories::BucketRepository> =
        Arc::new(InMemoryBucketRepository::default());
    let media_repo: Arc<dyn channelcast_core::repositories::MediaRepository> =
        Arc::new(InMemoryMediaRepository::default());
    let schedule_repo: Arc<dyn channelcast_core::repositories::ScheduleBlockRepository> =
        Arc::new(InMemoryScheduleBlockRepository::default());
    let epg_cache_repo: Arc<dyn channelcast_core::repositories::EpgCacheRepository> =
        Arc::new(InMemoryEpgCacheRepository::default());

    let epg = Arc::new(EpgProjector::new(
        channel_repo.clone(),
        bucket_repo.clone(),
        media_repo.clone(),
        schedule_repo.clone(),
        epg_cache_repo,
        48,
        5,
        120,
    ));
    let hls = Arc::new(HlsPlaylistService::new());
    let transcoder = Arc::new(TranscoderWorker::new("ffmpeg"));
    let bumper = Arc::new(BumperGenerator::new("ffmpeg", data_dir.join("bumper_cache")));
    let viewer_tracker = Arc::new(ViewerSessionTracker::new(std::time::Duration::from_secs(45)));
    let state_persistence = Arc::new(StatePersistence::new(data_dir.join("state.json")));

    let scheduler = ChannelScheduler::new(
        channel_repo.clone(),
        bucket_repo.clone(),
        media_repo.clone(),
        schedule_repo.clone(),
        epg.clone(),
        transcoder.clone(),
        bumper.clone(),
        hls.clone(),
        8,
    );

    state::AppState {
        config,
        channel_repo,
        bucket_repo,
        media_repo,
        schedule_repo,
        epg,
        hls,
        scheduler,
        viewer_tracker,
        transcoder,
        bumper,
        state_persistence,
    }
}

fn test_app(data_dir: &std::path::Path) -> axum::Router {
    create_app(test_state(data_dir))
}

#[tokio::test]
async fn healthz_returns_ok() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path());

    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_channel_playlist_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/nonexistent/stream.m3u8")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn epg_xml_with_no_channels_is_an_empty_tv_document() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path());

    let response = app
        .oneshot(Request::builder().uri("/epg.xml").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("<tv>"));
}
