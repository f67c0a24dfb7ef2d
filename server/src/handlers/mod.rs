pub mod epg;
pub mod playback;
