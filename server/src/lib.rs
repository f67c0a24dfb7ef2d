pub mod config;
pub mod errors;
pub mod handlers;
pub mod state;

use axum::routing::get;
use axum::{extract::State, Json, Router};
use channelcast_core::bumper::BumperGenerator;
use channelcast_core::epg::EpgProjector;
use channelcast_core::hls::HlsPlaylistService;
use channelcast_core::repositories::memory::{
    InMemoryBucketRepository, InMemoryChannelRepository, InMemoryEpgCacheRepository,
    InMemoryMediaRepository, InMemoryScheduleBlockRepository,
};
use channelcast_core::scheduler::{ChannelEvent, ChannelScheduler};
use channelcast_core::state_persistence::StatePersistence;
use channelcast_core::transcoder::TranscoderWorker;
use channelcast_core::viewer::ViewerSessionTracker;
use config::Config;
use state::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builds every ambient component and binds the listening socket. Returns
/// once the server has shut down cleanly.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let config = Arc::new(config);
    tokio::fs::create_dir_all(&config.data_dir).await?;

    let transcoder = Arc::new(TranscoderWorker::new(config.core.ffmpeg_path.clone()));
    let orphans_killed = transcoder.kill_orphans(&config.data_dir).await;
    if orphans_killed > 0 {
        tracing::warn!(orphans_killed, "terminated leaked transcoder processes from a previous run");
    }

    // In-memory repositories stand in for the Postgres-backed ones here; a
    // real deployment wires `repositories::postgres` instead (see DESIGN.md).
    if config.database_url.is_some() {
        tracing::warn!("DATABASE_URL is set but this build wires in-memory repositories; ignoring it");
    }
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
        epg_cache_repo.clone(),
        config.core.epg_lookahead_hours,
        config.core.epg_cache_minutes,
        config.core.epg_database_cache_minutes,
    ));

    let hls = Arc::new(HlsPlaylistService::new());
    let bumper = Arc::new(BumperGenerator::new(
        config.core.ffmpeg_path.clone(),
        config.data_dir.join("bumper_cache"),
    ));
    let viewer_tracker = Arc::new(ViewerSessionTracker::new(config.core.viewer_grace_period()));
    let state_persistence = Arc::new(StatePersistence::new(config.state_file_path()));

    let scheduler = ChannelScheduler::new(
        channel_repo.clone(),
        bucket_repo.clone(),
        media_repo.clone(),
        schedule_repo.clone(),
        epg.clone(),
        transcoder.clone(),
        bumper.clone(),
        hls.clone(),
        config.core.max_concurrent_streams,
    );

    restore_persisted_state(&state_persistence, &channel_repo).await;
    spawn_activation_bridge(scheduler.clone(), viewer_tracker.clone());
    state_persistence
        .clone()
        .spawn_periodic_snapshot({
            let scheduler = scheduler.clone();
            move || {
                let scheduler = scheduler.clone();
                async move { scheduler.snapshot_all().await }
            }
        });

    let shutdown_scheduler = scheduler.clone();
    let shutdown_state_persistence = state_persistence.clone();

    let app_state = AppState {
        config: config.clone(),
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
    };

    let app = create_app(app_state);
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!(host = %config.host, port = config.port, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // New HTTP connections are already refused by the time
    // `with_graceful_shutdown` returns above;
    // from here, stop every channel actor's transcoder within a bounded
    // deadline, then take one final state snapshot before exiting so a
    // restart resumes from the true last position rather than up to a
    // minute of periodic-snapshot staleness.
    shutdown_scheduler
        .shutdown(std::time::Duration::from_secs(30))
        .await;

    let final_snapshot = shutdown_scheduler.snapshot_all().await;
    if let Err(e) = shutdown_state_persistence.save(&final_snapshot).await {
        tracing::error!(error = %e, "failed to persist final state at shutdown");
    }

    tracing::info!("shutdown complete");
    Ok(())
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/epg.xml", get(handlers::epg::epg_xml))
        .route("/:slug/master.m3u8", get(handlers::playback::master_playlist))
        .route("/:slug/stream.m3u8", get(handlers::playback::media_playlist))
        .route("/:slug/init.mp4", get(handlers::playback::init_segment))
        .route("/:slug/:file_name", get(handlers::playback::segment))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    let channel_count = state.channel_repo.list().await.map(|c| c.len()).unwrap_or(0);
    Json(serde_json::json!({
        "status": "ok",
        "channels": channel_count,
    }))
}

async fn restore_persisted_state(
    state_persistence: &Arc<StatePersistence>,
    channel_repo: &Arc<dyn channelcast_core::repositories::ChannelRepository>,
) {
    let restored = match state_persistence.load().await {
        Ok(channels) => channels,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load persisted state, starting fresh");
            return;
        }
    };

    for persisted in restored {
        if let Ok(Some(mut channel)) = channel_repo.get(persisted.channel_id).await {
            channel.runtime.current_index = persisted.current_index;
            channel.runtime.schedule_anchor_time = persisted.schedule_anchor_time;
            // Restored channels are never auto-started; they stay Idle
            // until the first viewer request activates them.
            channel.runtime.state = channelcast_core::models::ChannelState::Idle;
            let _ = channel_repo.upsert(channel).await;
        }
    }
}

/// Bridges `ViewerSessionTracker`'s activate/deactivate ticker into the
/// per-channel actors it doesn't otherwise know about.
fn spawn_activation_bridge(
    scheduler: Arc<ChannelScheduler>,
    viewer_tracker: Arc<ViewerSessionTracker>,
) {
    let mut events = viewer_tracker.activation_events();
    tokio::spawn(async move {
        while let Some(signal) = events.recv().await {
            let handle = scheduler.clone().ensure_spawned(signal.channel_id).await;
            let event = match signal.event {
                channelcast_core::viewer::ActivationEvent::Activate => ChannelEvent::Activate,
                channelcast_core::viewer::ActivationEvent::Deactivate => ChannelEvent::Deactivate,
            };
            handle.send(event).await;
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
