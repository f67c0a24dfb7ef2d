//! 24/7 linear channel scheduling and playout core.
//!
//! Owns everything upstream of the HTTP edge: resolving what should be
//! airing, driving ffmpeg to produce it, projecting a guide from the same
//! math the player uses, and persisting enough state to survive a restart.
//! The `server` crate wires this library to axum.

pub mod bumper;
pub mod config;
pub mod epg;
pub mod error;
pub mod hls;
pub mod models;
pub mod repositories;
pub mod resolver;
pub mod scheduler;
pub mod schedule_time;
pub mod state_persistence;
pub mod transcoder;
pub mod viewer;

pub use config::CoreConfig;
pub use error::{CoreError, Result};
