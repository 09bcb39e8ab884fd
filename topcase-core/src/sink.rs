//! Consumers of routed messages.
//!
//! The keyboard and trackpad decoders live outside the protocol core. They
//! are attached to and detached from the controller by the surrounding
//! platform code; the controller only borrows them.
//!
//! Sink methods run on the receive path, which may be an interrupt handler.
//! They must not block and must not call back into the controller; a sink
//! that needs to do real work should copy the message
//! ([`Message::to_owned_message`]) and hand it to a task.

use topcase_proto::Message;

/// Receives keyboard reports.
pub trait KeyboardSink {
    /// Handle one keyboard message.
    fn recv_message(&self, message: &Message<'_>);
}

/// Receives trackpad reports and touchpad information.
pub trait TrackpadSink {
    /// Handle one trackpad report or command acknowledgement.
    fn recv_message(&self, message: &Message<'_>);

    /// Handle the touchpad information reply.
    fn recv_info(&self, message: &Message<'_>);
}

/// The sinks attached at the moment a packet is routed.
#[derive(Clone, Copy, Default)]
pub struct Sinks<'s> {
    /// Keyboard sink, if attached.
    pub keyboard: Option<&'s dyn KeyboardSink>,
    /// Trackpad sink, if attached.
    pub trackpad: Option<&'s dyn TrackpadSink>,
}
