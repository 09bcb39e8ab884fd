//! Sinks that hand received messages to tasks.

use defmt::warn;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use topcase_core::{KeyboardSink, TrackpadSink};
use topcase_proto::{Message, OwnedMessage};

/// Depth of each sink queue.
pub const QUEUE_DEPTH: usize = 8;

/// Queue of keyboard messages.
pub type MessageQueue = Channel<CriticalSectionRawMutex, OwnedMessage, QUEUE_DEPTH>;

/// Queue of trackpad events.
pub type TrackpadQueue = Channel<CriticalSectionRawMutex, TrackpadEvent, QUEUE_DEPTH>;

/// A message delivered to the trackpad sink.
#[derive(Debug, Clone, defmt::Format)]
pub enum TrackpadEvent {
    /// Trackpad report or command acknowledgement.
    Report(OwnedMessage),
    /// Touchpad information reply.
    Info(OwnedMessage),
}

/// Keyboard sink that queues every message.
pub struct ForwardingKeyboard {
    queue: &'static MessageQueue,
}

impl ForwardingKeyboard {
    /// Forward into `queue`.
    #[must_use]
    pub const fn new(queue: &'static MessageQueue) -> Self {
        Self { queue }
    }
}

impl KeyboardSink for ForwardingKeyboard {
    fn recv_message(&self, message: &Message<'_>) {
        if self.queue.try_send(message.to_owned_message()).is_err() {
            warn!("keyboard queue full, dropping report");
        }
    }
}

/// Trackpad sink that queues every message.
pub struct ForwardingTrackpad {
    queue: &'static TrackpadQueue,
}

impl ForwardingTrackpad {
    /// Forward into `queue`.
    #[must_use]
    pub const fn new(queue: &'static TrackpadQueue) -> Self {
        Self { queue }
    }

    fn forward(&self, event: TrackpadEvent) {
        if self.queue.try_send(event).is_err() {
            warn!("trackpad queue full, dropping report");
        }
    }
}

impl TrackpadSink for ForwardingTrackpad {
    fn recv_message(&self, message: &Message<'_>) {
        self.forward(TrackpadEvent::Report(message.to_owned_message()));
    }

    fn recv_info(&self, message: &Message<'_>) {
        self.forward(TrackpadEvent::Info(message.to_owned_message()));
    }
}
