//! Event system for observing the serial pipeline
//!
//! Provides:
//! - Event types for traffic, notices and state changes
//! - Event dispatcher for publishing events to subscribers (telnet mirror,
//!   front-ends, tests)

use crate::data::{ConnectionState, FirmwareInfo};
use tokio::sync::broadcast;

/// Classification of a complete response line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Acknowledgment; retired the oldest in-flight command
    Ok,
    /// Unsolicited temperature report
    AutoTemperature,
    /// `M114` style position report
    Position,
    /// `echo:busy`
    Busy,
    /// `echo: cold extrusion prevented`
    ColdExtrusion,
    /// `Error:`; triggers a cancel request
    Error,
    /// Unrecognised line, kept as part of a multi-line response
    Incomplete,
    /// Received before a printer was detected
    Discovering,
}

impl std::fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::AutoTemperature => write!(f, "autotemp"),
            Self::Position => write!(f, "position"),
            Self::Busy => write!(f, "busy"),
            Self::ColdExtrusion => write!(f, "cold extrusion"),
            Self::Error => write!(f, "ERROR"),
            Self::Incomplete => write!(f, "wait more"),
            Self::Discovering => write!(f, "discovering"),
        }
    }
}

/// Bridge event types
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    /// A command was written to the printer
    Transmitted(String),
    /// A response line was received
    Received {
        /// Line text without its newline.
        line: String,
        kind: ResponseKind,
    },
    /// Human readable operator notice
    Notice(String),
    /// An in-flight command got no answer within the keepalive interval
    Timeout,
    /// Firmware detection succeeded
    Connected(FirmwareInfo),
    /// Front-end visible state changed
    StateChanged(ConnectionState),
}

impl std::fmt::Display for BridgeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeEvent::Transmitted(command) => write!(f, ">{}", command),
            BridgeEvent::Received { line, .. } => write!(f, "{}", line),
            BridgeEvent::Notice(text) => write!(f, "{}", text),
            BridgeEvent::Timeout => write!(f, "#TIMEOUT#"),
            BridgeEvent::Connected(info) => write!(f, "Connected to {}", info.machine_type),
            BridgeEvent::StateChanged(state) => write!(f, "State: {}", state),
        }
    }
}

/// Event dispatcher for publishing events to subscribers
#[derive(Clone)]
pub struct EventDispatcher {
    /// Broadcast sender channel for bridge events.
    tx: broadcast::Sender<BridgeEvent>,
}

impl EventDispatcher {
    /// Create a new event dispatcher
    ///
    /// # Arguments
    /// * `buffer_size` - Size of the broadcast buffer (default 256)
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size);
        Self { tx }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all subscribers
    ///
    /// Having no subscribers is normal, so the send result is dropped.
    pub fn publish(&self, event: BridgeEvent) {
        let _ = self.tx.send(event);
    }

    /// Publish an operator notice
    pub fn notice(&self, text: impl Into<String>) {
        self.publish(BridgeEvent::Notice(text.into()));
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let events = EventDispatcher::default();
        events.notice("nobody listening");
        assert_eq!(events.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let events = EventDispatcher::default();
        let mut rx = events.subscribe();
        events.publish(BridgeEvent::Transmitted("M105".to_string()));
        events.publish(BridgeEvent::Timeout);

        assert_eq!(rx.recv().await.unwrap().to_string(), ">M105");
        assert_eq!(rx.recv().await.unwrap().to_string(), "#TIMEOUT#");
    }
}
