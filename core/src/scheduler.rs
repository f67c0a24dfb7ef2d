//! Channel Scheduler: one actor task per channel, driving the state machine
//! that turns viewer activity and transcoder health into ffmpeg runs. This
//! mirrors the per-connection actor loop the transcoder worker itself uses
//! at a smaller scale, lifted one level up to own the full channel
//! lifecycle (`transcoder::TranscoderWorker` is the thing it drives).

use crate::bumper::{BumperGenerator, BumperRequest};
use crate::epg::EpgProjector;
use crate::error::{CoreError, Result};
use crate::hls::HlsPlaylistService;
use crate::models::{
    Bucket, Channel, ChannelBucketLink, ChannelConfig, ChannelState, InputDescriptor, MediaItem,
    ScheduleBlock,
};
use crate::repositories::{BucketRepository, ChannelRepository, MediaRepository, ScheduleBlockRepository};
use crate::resolver::{Resolver, ResolverInput};
use crate::schedule_time::ScheduleTimeService;
use crate::state_persistence::PersistedChannelState;
use crate::transcoder::{RunSpec, TranscoderEvent, TranscoderWorker};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

const FAILURE_WINDOW: ChronoDuration = ChronoDuration::seconds(60);
const FAILURE_THRESHOLD_FOR_BACKOFF: usize = 3;
const MAX_RESTART_ATTEMPTS: usize = 5;
const BACKOFF_DELAY_SECS: u64 = 30;
const WAITING_RETRY_SECS: u64 = 60;
const LOOKAHEAD_ITEMS: usize = 1;

#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Activate,
    Deactivate,
    ItemEnd,
    WorkerFailed { message: String },
    WorkerExited,
    DeleteChannel,
}

#[derive(Clone)]
pub struct ChannelHandle {
    pub channel_id: Uuid,
    sender: mpsc::Sender<ChannelEvent>,
}

impl ChannelHandle {
    pub async fn send(&self, event: ChannelEvent) {
        if self.sender.send(event).await.is_err() {
            warn!(channel_id = %self.channel_id, "channel actor is gone, dropping event");
        }
    }
}

pub struct ChannelScheduler {
    channel_repo: Arc<dyn ChannelRepository>,
    bucket_repo: Arc<dyn BucketRepository>,
    media_repo: Arc<dyn MediaRepository>,
    schedule_repo: Arc<dyn ScheduleBlockRepository>,
    epg: Arc<EpgProjector>,
    transcoder: Arc<TranscoderWorker>,
    bumper: Arc<BumperGenerator>,
    hls: Arc<HlsPlaylistService>,
    stream_slots: Arc<Semaphore>,
    handles: Mutex<HashMap<Uuid, ChannelHandle>>,
}

impl ChannelScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        channel_repo: Arc<dyn ChannelRepository>,
        bucket_repo: Arc<dyn BucketRepository>,
        media_repo: Arc<dyn MediaRepository>,
        schedule_repo: Arc<dyn ScheduleBlockRepository>,
        epg: Arc<EpgProjector>,
        transcoder: Arc<TranscoderWorker>,
        bumper: Arc<BumperGenerator>,
        hls: Arc<HlsPlaylistService>,
        max_concurrent_streams: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            channel_repo,
            bucket_repo,
            media_repo,
            schedule_repo,
            epg,
            transcoder,
            bumper,
            hls,
            stream_slots: Arc::new(Semaphore::new(max_concurrent_streams)),
            handles: Mutex::new(HashMap::new()),
        })
    }

    /// Spawns the actor for `channel_id` if one is not already running, and
    /// returns a handle to send it events. Takes `Arc<Self>` by value (the
    /// caller clones its handle) since the spawned actor task needs its own
    /// owned reference back to the scheduler.
    pub async fn ensure_spawned(self: Arc<Self>, channel_id: Uuid) -> ChannelHandle {
        let mut handles = self.handles.lock().await;
        if let Some(handle) = handles.get(&channel_id) {
            return handle.clone();
        }

        let (tx, rx) = mpsc::channel(32);
        let handle = ChannelHandle {
            channel_id,
            sender: tx,
        };
        handles.insert(channel_id, handle.clone());
        drop(handles);

        tokio::spawn(async move {
            run_channel_actor(self, channel_id, rx).await;
        });

        handle
    }

    pub async fn handle_for(&self, channel_id: Uuid) -> Option<ChannelHandle> {
        self.handles.lock().await.get(&channel_id).cloned()
    }

    /// Collects the current playback position of every running actor, for
    /// the periodic state-persistence snapshot.
    pub async fn snapshot_all(&self) -> Vec<PersistedChannelState> {
        // Each actor owns its own state; the scheduler only tracks which
        // channels exist. The concrete positions are read straight from the
        // channel repository, which the actor keeps up to date on every
        // advance (see `ActorState::persist_runtime`).
        let mut out = Vec::new();
        let handles = self.handles.lock().await;
        for channel_id in handles.keys() {
            if let Ok(Some(channel)) = self.channel_repo.get(*channel_id).await {
                out.push(PersistedChannelState {
                    channel_id: *channel_id,
                    current_index: channel.runtime.current_index,
                    schedule_anchor_time: channel.runtime.schedule_anchor_time,
                    was_streaming: matches!(
                        channel.runtime.state,
                        ChannelState::Streaming | ChannelState::Transitioning
                    ),
                });
            }
        }
        out
    }

    /// Orchestrator shutdown sweep: persists `Stopping` for every
    /// channel with a live actor, then asks all of their transcoders to exit
    /// concurrently, bounded by `deadline`. `TranscoderWorker::stop` already
    /// escalates a single lingering process to SIGKILL on its own shorter
    /// timeout; this bound exists for the case where many channels are
    /// stopping at once and the sum of their individual timeouts would
    /// otherwise run past the shutdown deadline. Channels whose subprocess
    /// is still exiting when `deadline` elapses are left running detached —
    /// `kill_orphans` reclaims them on the next startup.
    pub async fn shutdown(&self, deadline: Duration) {
        let channel_ids: Vec<Uuid> = self.handles.lock().await.keys().copied().collect();

        for channel_id in &channel_ids {
            if let Ok(Some(mut channel)) = self.channel_repo.get(*channel_id).await {
                channel.runtime.state = ChannelState::Stopping;
                let _ = self.channel_repo.upsert(channel).await;
            }
        }

        let mut joins = JoinSet::new();
        for channel_id in channel_ids {
            let transcoder = self.transcoder.clone();
            joins.spawn(async move {
                let _ = transcoder.stop(channel_id).await;
            });
        }

        let reaped_all = tokio::time::timeout(deadline, async {
            while joins.join_next().await.is_some() {}
        })
        .await
        .is_ok();
        if !reaped_all {
            warn!(?deadline, "channel shutdown sweep exceeded deadline; remaining transcoders left running");
        }
    }
}

struct ConcatItem {
    path: std::path::PathBuf,
    inpoint: Option<f64>,
}

struct ActorState {
    scheduler: Arc<ChannelScheduler>,
    channel_id: Uuid,
    config: ChannelConfig,
    consecutive_failures: VecDeque<DateTime<Utc>>,
    total_attempts: usize,
    stream_permit: Option<tokio::sync::OwnedSemaphorePermit>,
    transcoder_events_rx: Option<mpsc::Receiver<TranscoderEvent>>,
}

impl ActorState {
    async fn resolve_catalog(
        &self,
    ) -> Result<(Vec<ScheduleBlock>, Vec<ChannelBucketLink>, Vec<Bucket>, Vec<MediaItem>)> {
        let schedule_blocks = self.scheduler.schedule_repo.for_channel(self.channel_id).await?;
        let channel_bucket_links = self
            .scheduler
            .channel_repo
            .channel_bucket_links(self.channel_id)
            .await?;

        let mut bucket_ids: Vec<Uuid> = schedule_blocks.iter().map(|b| b.bucket_id).collect();
        bucket_ids.extend(channel_bucket_links.iter().map(|l| l.bucket_id));
        bucket_ids.sort_unstable();
        bucket_ids.dedup();

        let mut buckets = Vec::with_capacity(bucket_ids.len());
        for id in &bucket_ids {
            if let Some(bucket) = self.scheduler.bucket_repo.get(*id).await? {
                buckets.push(bucket);
            }
        }

        let mut media_ids: Vec<Uuid> = buckets.iter().flat_map(|b| b.media_ids.clone()).collect();
        media_ids.sort_unstable();
        media_ids.dedup();
        let media_items = self.scheduler.media_repo.get_many(&media_ids).await?;

        Ok((schedule_blocks, channel_bucket_links, buckets, media_items))
    }

    async fn resolve_now(&self, at_time: DateTime<Utc>) -> Result<Vec<MediaItem>> {
        let (schedule_blocks, channel_bucket_links, buckets, media_items) =
            self.resolve_catalog().await?;
        let buckets_by_id: HashMap<Uuid, &Bucket> = buckets.iter().map(|b| (b.id, b)).collect();
        let media_by_id: HashMap<Uuid, &MediaItem> =
            media_items.iter().map(|m| (m.id, m)).collect();
        let input = ResolverInput {
            channel_id: self.channel_id,
            schedule_blocks: &schedule_blocks,
            buckets_by_id: &buckets_by_id,
            media_by_id: &media_by_id,
            channel_bucket_links: &channel_bucket_links,
        };
        Ok(Resolver::resolve(&input, at_time, 0))
    }

    /// Earliest future moment (within 24h) at which a currently-inactive
    /// schedule block would become active, used to avoid busy-polling while
    /// waiting for content.
    async fn next_block_start(&self, at_time: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let schedule_blocks = self
            .scheduler
            .schedule_repo
            .for_channel(self.channel_id)
            .await
            .ok()?;
        schedule_blocks
            .iter()
            .filter(|b| b.enabled)
            .filter_map(|b| {
                let mut candidate = at_time.date_naive().and_time(b.start_time).and_utc();
                if candidate <= at_time {
                    candidate += ChronoDuration::days(1);
                }
                Some(candidate)
            })
            .min()
    }

    async fn load_channel(&self) -> Result<Channel> {
        self.scheduler
            .channel_repo
            .get(self.channel_id)
            .await?
            .ok_or_else(|| CoreError::ChannelNotFound(self.channel_id.to_string()))
    }

    async fn persist_runtime(
        &self,
        state: ChannelState,
        current_index: usize,
        anchor: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut channel = self.load_channel().await?;
        channel.runtime.state = state;
        channel.runtime.current_index = current_index;
        if anchor.is_some() {
            channel.runtime.schedule_anchor_time = anchor;
        }
        self.scheduler.channel_repo.upsert(channel).await
    }

    /// Builds the concat manifest for the next on-air run: a bumper
    /// announcing the upcoming item, the item itself (seeked in only if
    /// this is the very first item of the run), and a short lookahead.
    async fn build_advance_manifest(
        &self,
        media: &[MediaItem],
        start_index: usize,
        seek_into_first: Option<f64>,
    ) -> Result<std::path::PathBuf> {
        let mut items = Vec::new();
        let next = &media[start_index % media.len()];

        let bumper_out = self.config.output_dir.join("bumper_next.ts");
        let bumper_request = BumperRequest {
            next_show_name: next.show_title.clone().unwrap_or_else(|| next.display_title()),
            next_episode_title: next.episode_title.clone(),
            duration_secs: 5,
            resolution: self.config.resolution,
            fps: self.config.fps,
            video_bitrate: self.config.video_bitrate.clone(),
            audio_bitrate: self.config.audio_bitrate.clone(),
            out_path: bumper_out.clone(),
        };
        match self.scheduler.bumper.produce_up_next(bumper_request).await {
            Ok(path) => items.push(ConcatItem {
                path,
                inpoint: None,
            }),
            Err(e) => warn!(channel_id = %self.channel_id, error = %e, "bumper generation failed, skipping"),
        }

        items.push(ConcatItem {
            path: next.path.clone(),
            inpoint: seek_into_first,
        });

        for offset in 1..=LOOKAHEAD_ITEMS {
            if media.len() > 1 {
                let lookahead = &media[(start_index + offset) % media.len()];
                items.push(ConcatItem {
                    path: lookahead.path.clone(),
                    inpoint: None,
                });
            }
        }

        let manifest_path = self.config.output_dir.join("concat.ffconcat");
        write_concat_manifest(&manifest_path, &items).await?;
        Ok(manifest_path)
    }

    fn record_failure(&mut self) -> bool {
        let now = Utc::now();
        self.consecutive_failures.push_back(now);
        while let Some(front) = self.consecutive_failures.front() {
            if now - *front > FAILURE_WINDOW {
                self.consecutive_failures.pop_front();
            } else {
                break;
            }
        }
        self.total_attempts += 1;
        self.consecutive_failures.len() >= FAILURE_THRESHOLD_FOR_BACKOFF
    }

    fn clear_failures(&mut self) {
        self.consecutive_failures.clear();
    }
}

async fn write_concat_manifest(path: &std::path::Path, items: &[ConcatItem]) -> Result<()> {
    let mut text = String::from("ffconcat version 1.0\n");
    for item in items {
        text.push_str(&format!("file '{}'\n", item.path.display()));
        if let Some(inpoint) = item.inpoint {
            text.push_str(&format!("inpoint {inpoint:.3}\n"));
        }
    }
    if items.is_empty() {
        return Err(CoreError::ConcatInvalid("no items to concatenate".to_string()));
    }
    tokio::fs::write(path, text).await.map_err(CoreError::Io)
}

async fn run_channel_actor(
    scheduler: Arc<ChannelScheduler>,
    channel_id: Uuid,
    mut rx: mpsc::Receiver<ChannelEvent>,
) {
    let config = match scheduler.channel_repo.get(channel_id).await {
        Ok(Some(channel)) => channel.config,
        _ => {
            error!(%channel_id, "channel actor started for unknown channel, exiting");
            return;
        }
    };

    let mut actor = ActorState {
        scheduler: scheduler.clone(),
        channel_id,
        config,
        consecutive_failures: VecDeque::new(),
        total_attempts: 0,
        stream_permit: None,
        transcoder_events_rx: None,
    };

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Some(event) => {
                        if matches!(event, ChannelEvent::DeleteChannel) {
                            handle_delete(&scheduler, &mut actor).await;
                            return;
                        }
                        handle_event(&mut actor, event).await;
                    }
                    None => return,
                }
            }
            Some(transcoder_event) = recv_transcoder_event(&mut actor.transcoder_events_rx) => {
                let mapped = match transcoder_event {
                    TranscoderEvent::ItemEnd { .. } => ChannelEvent::ItemEnd,
                    TranscoderEvent::AbnormalExit { message, .. } => ChannelEvent::WorkerFailed { message },
                    TranscoderEvent::SpawnFailed { message, .. } => ChannelEvent::WorkerFailed { message },
                };
                handle_event(&mut actor, mapped).await;
            }
        }
    }
}

async fn recv_transcoder_event(
    rx: &mut Option<mpsc::Receiver<TranscoderEvent>>,
) -> Option<TranscoderEvent> {
    match rx {
        Some(channel) => channel.recv().await,
        None => std::future::pending().await,
    }
}

async fn handle_delete(scheduler: &Arc<ChannelScheduler>, actor: &mut ActorState) {
    let _ = scheduler.transcoder.stop(actor.channel_id).await;
    scheduler.handles.lock().await.remove(&actor.channel_id);
    info!(channel_id = %actor.channel_id, "channel deleted, actor stopping");
}

async fn handle_event(actor: &mut ActorState, event: ChannelEvent) {
    match event {
        ChannelEvent::Activate => on_activate(actor).await,
        ChannelEvent::Deactivate => on_deactivate(actor).await,
        ChannelEvent::ItemEnd => on_item_end(actor).await,
        ChannelEvent::WorkerFailed { message } => on_worker_failed(actor, message).await,
        ChannelEvent::WorkerExited => {
            info!(channel_id = %actor.channel_id, "transcoder exited cleanly");
        }
        ChannelEvent::DeleteChannel => unreachable!("handled by caller"),
    }
}

async fn on_activate(actor: &mut ActorState) {
    let channel = match actor.load_channel().await {
        Ok(c) => c,
        Err(e) => {
            error!(channel_id = %actor.channel_id, error = %e, "cannot load channel on activate");
            return;
        }
    };
    if matches!(channel.runtime.state, ChannelState::Streaming | ChannelState::Starting) {
        return;
    }

    let permit = match actor.scheduler.stream_slots.clone().try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            warn!(channel_id = %actor.channel_id, "max concurrent streams reached, deferring activation");
            return;
        }
    };
    actor.stream_permit = Some(permit);

    let _ = actor
        .persist_runtime(ChannelState::Starting, channel.runtime.current_index, None)
        .await;

    start_or_resume(actor).await;
}

async fn on_deactivate(actor: &mut ActorState) {
    let _ = actor.scheduler.transcoder.stop(actor.channel_id).await;
    actor.transcoder_events_rx = None;
    actor.stream_permit = None;
    let _ = actor
        .persist_runtime(ChannelState::Idle, 0, None)
        .await;
}

/// Starts the first run of an on-air session: recovers position from the
/// EPG Projector first (the single source of truth), falling back to the
/// persisted index only if the EPG has nothing, and waits if the resolver
/// currently yields no media.
async fn start_or_resume(actor: &mut ActorState) {
    let now = Utc::now();
    let media = match actor.resolve_now(now).await {
        Ok(m) => m,
        Err(e) => {
            error!(channel_id = %actor.channel_id, error = %e, "resolve failed on activate");
            return;
        }
    };

    if media.is_empty() {
        info!(channel_id = %actor.channel_id, "no media assigned, remaining idle");
        schedule_wait_retry(actor.scheduler.clone(), actor.channel_id, actor.next_block_start(now).await).await;
        return;
    }

    let channel = match actor.load_channel().await {
        Ok(c) => c,
        Err(_) => return,
    };
    let anchor = channel.runtime.schedule_anchor_time.unwrap_or(now);

    let epg_position = actor
        .scheduler
        .epg
        .position_for_current_program(actor.channel_id)
        .await
        .ok()
        .flatten();
    let position = epg_position
        .or_else(|| ScheduleTimeService::position_at(&media, anchor, now))
        .unwrap_or(crate::schedule_time::Position {
            file_index: channel.runtime.current_index.min(media.len() - 1),
            seek_position_secs: 0.0,
            elapsed_secs: 0.0,
        });

    let manifest = match actor
        .build_advance_manifest(&media, position.file_index, Some(position.seek_position_secs))
        .await
    {
        Ok(path) => path,
        Err(e) => {
            error!(channel_id = %actor.channel_id, error = %e, "failed to build initial manifest");
            return;
        }
    };

    launch_transcoder(actor, InputDescriptor::ConcatManifest { manifest_path: manifest }, position.file_index, anchor)
        .await;
}

async fn launch_transcoder(
    actor: &mut ActorState,
    input: InputDescriptor,
    current_index: usize,
    anchor: DateTime<Utc>,
) {
    let (tx, rx) = mpsc::channel(16);
    actor.transcoder_events_rx = Some(rx);

    let spec = RunSpec {
        channel_id: actor.channel_id,
        input,
        output_dir: actor.config.output_dir.clone(),
        video_bitrate: actor.config.video_bitrate.clone(),
        audio_bitrate: actor.config.audio_bitrate.clone(),
        resolution: actor.config.resolution,
        fps: actor.config.fps,
        segment_duration_secs: actor.config.segment_duration_secs,
        watermark: None,
    };

    match actor.scheduler.transcoder.start(spec, tx).await {
        Ok(()) => {
            actor.clear_failures();
            let _ = actor
                .persist_runtime(ChannelState::Streaming, current_index, Some(anchor))
                .await;
        }
        Err(e) => {
            error!(channel_id = %actor.channel_id, error = %e, "transcoder failed to start");
            on_worker_failed(actor, e.to_string()).await;
        }
    }
}

async fn on_item_end(actor: &mut ActorState) {
    let now = Utc::now();
    let media = match actor.resolve_now(now).await {
        Ok(m) => m,
        Err(e) => {
            error!(channel_id = %actor.channel_id, error = %e, "resolve failed on item end");
            return;
        }
    };

    if media.is_empty() {
        let _ = actor.scheduler.transcoder.stop(actor.channel_id).await;
        let _ = actor.persist_runtime(ChannelState::Idle, 0, None).await;
        schedule_wait_retry(actor.scheduler.clone(), actor.channel_id, actor.next_block_start(now).await).await;
        return;
    }

    let channel = match actor.load_channel().await {
        Ok(c) => c,
        Err(_) => return,
    };
    let anchor = channel.runtime.schedule_anchor_time.unwrap_or(now);
    let next_index = (channel.runtime.current_index + 1) % media.len();

    let _ = actor
        .persist_runtime(ChannelState::Transitioning, next_index, None)
        .await;

    let manifest = match actor.build_advance_manifest(&media, next_index, None).await {
        Ok(path) => path,
        Err(e) => {
            error!(channel_id = %actor.channel_id, error = %e, "failed to build advance manifest");
            return;
        }
    };

    // The new run's first segment continues the existing numbering (the
    // transcoder never resets it), so the next number after today's highest
    // is where the discontinuity will land once ffmpeg writes it.
    let baseline = actor
        .scheduler
        .transcoder
        .current_highest_segment(&actor.config.output_dir)
        .await;

    launch_transcoder(actor, InputDescriptor::ConcatManifest { manifest_path: manifest }, next_index, anchor).await;

    actor
        .scheduler
        .hls
        .record_transition(actor.channel_id, baseline + 1)
        .await;
}

async fn on_worker_failed(actor: &mut ActorState, message: String) {
    warn!(channel_id = %actor.channel_id, %message, "transcoder reported failure");
    let should_back_off = actor.record_failure();

    if actor.total_attempts >= MAX_RESTART_ATTEMPTS {
        error!(channel_id = %actor.channel_id, "transcoder failed repeatedly, giving up until next explicit activation");
        let _ = actor
            .persist_runtime(ChannelState::Idle, 0, None)
            .await;
        actor.stream_permit = None;
        return;
    }

    let _ = actor.persist_runtime(ChannelState::Stopping, 0, None).await;

    if should_back_off {
        warn!(channel_id = %actor.channel_id, "backing off {}s after repeated failures", BACKOFF_DELAY_SECS);
        tokio::time::sleep(std::time::Duration::from_secs(BACKOFF_DELAY_SECS)).await;
        actor.clear_failures();
    }

    start_or_resume(actor).await;
}

/// Spawns a detached retry that re-activates the channel either after a
/// fixed poll interval or, if a future schedule block is known, right when
/// it starts (whichever is sooner).
async fn schedule_wait_retry(
    scheduler: Arc<ChannelScheduler>,
    channel_id: Uuid,
    next_block_start: Option<DateTime<Utc>>,
) {
    let delay = match next_block_start {
        Some(start) => {
            let secs = (start - Utc::now()).num_seconds().max(0) as u64;
            secs.min(WAITING_RETRY_SECS * 24)
        }
        None => WAITING_RETRY_SECS,
    };

    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(delay.max(1))).await;
        if let Some(handle) = scheduler.handle_for(channel_id).await {
            handle.send(ChannelEvent::Activate).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn concat_manifest_contains_inpoint_only_for_seeked_item() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concat.ffconcat");
        let items = vec![
            ConcatItem {
                path: "/media/bumper.ts".into(),
                inpoint: None,
            },
            ConcatItem {
                path: "/media/show.mp4".into(),
                inpoint: Some(12.5),
            },
        ];
        write_concat_manifest(&path, &items).await.unwrap();
        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(text.contains("file '/media/bumper.ts'"));
        assert!(text.contains("inpoint 12.500"));
        assert_eq!(text.matches("inpoint").count(), 1);
    }

    #[tokio::test]
    async fn empty_manifest_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concat.ffconcat");
        let result = write_concat_manifest(&path, &[]).await;
        assert!(result.is_err());
    }
}
