use crate::config::Config;
use channelcast_core::bumper::BumperGenerator;
use channelcast_core::epg::EpgProjector;
use channelcast_core::hls::HlsPlaylistService;
use channelcast_core::repositories::{
    BucketRepository, ChannelRepository, MediaRepository, ScheduleBlockRepository,
};
use channelcast_core::scheduler::ChannelScheduler;
use channelcast_core::state_persistence::StatePersistence;
use channelcast_core::transcoder::TranscoderWorker;
use channelcast_core::viewer::ViewerSessionTracker;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub channel_repo: Arc<dyn ChannelRepository>,
    pub bucket_repo: Arc<dyn BucketRepository>,
    pub media_repo: Arc<dyn MediaRepository>,
    pub schedule_repo: Arc<dyn ScheduleBlockRepository>,
    pub epg: Arc<EpgProjector>,
    pub hls: Arc<HlsPlaylistService>,
    pub scheduler: Arc<ChannelScheduler>,
    pub viewer_tracker: Arc<ViewerSessionTracker>,
    pub transcoder: Arc<TranscoderWorker>,
    pub bumper: Arc<BumperGenerator>,
    pub state_persistence: Arc<StatePersistence>,
}
