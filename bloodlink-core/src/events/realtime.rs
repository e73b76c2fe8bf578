use bloodlink_sdk::objects::RealtimeFrame;
use tokio::sync::broadcast;

/// Pushes named events to connected realtime clients.
///
/// Emission never blocks and never fails; events sent with nobody
/// listening are lost.
pub trait RealtimeBroadcaster: Send + Sync {
    fn emit(&self, event: &str, payload: &serde_json::Value);
}

const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out to every subscribed socket.
///
/// Slow subscribers that fall more than the channel capacity behind skip
/// the oldest frames.
pub struct BroadcastHub {
    sender: broadcast::Sender<RealtimeFrame>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeFrame> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RealtimeBroadcaster for BroadcastHub {
    fn emit(&self, event: &str, payload: &serde_json::Value) {
        let frame = RealtimeFrame {
            event: event.to_owned(),
            payload: payload.clone(),
        };
        // Err only means no client is connected.
        let _ = self.sender.send(frame);
    }
}
