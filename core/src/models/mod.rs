pub mod bucket;
pub mod channel;
pub mod epg_program;
pub mod media_item;
pub mod schedule_block;
pub mod segment_window;
pub mod transcoder_run;

pub use bucket::{Bucket, BucketKind, ChannelBucketLink};
pub use channel::{Channel, ChannelConfig, ChannelRuntime, ChannelState};
pub use epg_program::EpgProgram;
pub use media_item::MediaItem;
pub use schedule_block::{DayOfWeek, PlaybackMode, ScheduleBlock};
pub use segment_window::{SegmentWindow, TransitionMarkers};
pub use transcoder_run::{InputDescriptor, TranscoderRun};
