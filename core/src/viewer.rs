//! Viewer Session Tracker: tracks recent segment/playlist requests per
//! channel and emits activate/deactivate signals on a 1-second ticker, the
//! way the teacher's stream handlers note request activity before serving
//! bytes (`stream::stream_handlers`).

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Playlist,
    Segment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationEvent {
    Activate,
    Deactivate,
}

#[derive(Debug, Clone, Copy)]
pub struct ActivationSignal {
    pub channel_id: Uuid,
    pub event: ActivationEvent,
}

struct ChannelActivity {
    last_seen_at: DateTime<Utc>,
    currently_active: bool,
}

pub struct ViewerSessionTracker {
    grace_period: Duration,
    activity: Arc<Mutex<HashMap<Uuid, ChannelActivity>>>,
}

impl ViewerSessionTracker {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            grace_period,
            activity: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn note_request(&self, channel_id: Uuid, kind: RequestKind) {
        debug!(%channel_id, ?kind, "viewer activity noted");
        let mut activity = self.activity.lock().await;
        activity
            .entry(channel_id)
            .or_insert_with(|| ChannelActivity {
                last_seen_at: Utc::now(),
                currently_active: false,
            })
            .last_seen_at = Utc::now();
    }

    /// Spawns the 1-second ticker and returns the receiving end of its
    /// activate/deactivate stream. The ticker runs until the sender is
    /// dropped.
    pub fn activation_events(&self) -> mpsc::Receiver<ActivationSignal> {
        let (tx, rx) = mpsc::channel(64);
        let activity = self.activity.clone();
        let grace_period = self.grace_period;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                let now = Utc::now();
                let mut activity = activity.lock().await;
                for (channel_id, state) in activity.iter_mut() {
                    let within_grace = (now - state.last_seen_at).num_seconds()
                        < grace_period.as_secs() as i64;
                    if within_grace && !state.currently_active {
                        state.currently_active = true;
                        if tx
                            .send(ActivationSignal {
                                channel_id: *channel_id,
                                event: ActivationEvent::Activate,
                            })
                            .await
                            .is_err()
                        {
                            return;
                        }
                    } else if !within_grace && state.currently_active {
                        state.currently_active = false;
                        if tx
                            .send(ActivationSignal {
                                channel_id: *channel_id,
                                event: ActivationEvent::Deactivate,
                            })
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                }
            }
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn note_request_then_tick_emits_activate() {
        let tracker = ViewerSessionTracker::new(Duration::from_secs(45));
        let channel_id = Uuid::new_v4();
        tracker.note_request(channel_id, RequestKind::Playlist).await;
        let mut events = tracker.activation_events();
        let signal = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("ticker should fire within 2s")
            .expect("channel should not close");
        assert_eq!(signal.channel_id, channel_id);
        assert_eq!(signal.event, ActivationEvent::Activate);
    }

    #[tokio::test]
    async fn never_requested_channel_emits_nothing() {
        let tracker = ViewerSessionTracker::new(Duration::from_secs(45));
        let mut events = tracker.activation_events();
        let result = tokio::time::timeout(Duration::from_millis(1500), events.recv()).await;
        assert!(result.is_err(), "no signal expected for idle tracker");
    }
}
