//! Probe event system.
//!
//! The probe hook publishes its status changes and readings on a broadcast
//! channel. Events are tagged with the [`RequestToken`] of the request they
//! belong to; untagged events (for example the return to `NotStarted` after a
//! cancel) concern whichever task currently owns the probe.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use dishtemp_types::{ProbeStatus, RequestToken, TemperatureReading};

/// Events emitted by a probe hook.
///
/// All events are serializable for logging and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ProbeEvent {
    /// The hook's status changed.
    Status {
        request: Option<RequestToken>,
        status: ProbeStatus,
    },
    /// A temperature was read.
    Reading {
        request: Option<RequestToken>,
        reading: TemperatureReading,
    },
}

impl ProbeEvent {
    /// A status event for a request.
    pub fn status(request: Option<RequestToken>, status: ProbeStatus) -> Self {
        Self::Status { request, status }
    }

    /// A reading event for a request.
    pub fn reading(request: Option<RequestToken>, reading: TemperatureReading) -> Self {
        Self::Reading { request, reading }
    }

    /// The request this event belongs to, if tagged.
    pub fn request(&self) -> Option<RequestToken> {
        match self {
            ProbeEvent::Status { request, .. } | ProbeEvent::Reading { request, .. } => *request,
        }
    }
}

/// Sender for probe events.
pub type EventSender = broadcast::Sender<ProbeEvent>;

/// Receiver for probe events.
pub type EventReceiver = broadcast::Receiver<ProbeEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    broadcast::channel(capacity)
}

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: ProbeEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(64)
    }
}
