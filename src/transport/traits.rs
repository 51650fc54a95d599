//! Transport trait abstraction for pluggable control-event sources

use async_trait::async_trait;
use gamepad_shared::ControlEvent;
use tokio::sync::mpsc;

/// A stream of control events from one input device
///
/// `next_event` must be cancel safe: the dispatcher polls it alongside the
/// flight-state feed and drops it when a notification arrives first.
#[async_trait]
pub trait ControlEventSource: Send {
    /// Next control event, or `None` once the device is gone
    async fn next_event(&mut self) -> Option<ControlEvent>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}

/// In-process source, fed by any task holding the sender
#[async_trait]
impl ControlEventSource for mpsc::Receiver<ControlEvent> {
    async fn next_event(&mut self) -> Option<ControlEvent> {
        self.recv().await
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}
