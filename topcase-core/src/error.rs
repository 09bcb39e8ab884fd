//! Driver error types.

use topcase_proto::{DecodeError, EncodeError};

use crate::config::ConfigError;
use crate::transport::TransportError;

/// Error type for topcase operations.
///
/// Everything except [`Error::Configuration`] is local to one transaction:
/// the controller records it, returns to idle and keeps serving the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Packet or message CRC mismatch; the packet was discarded.
    ChecksumMismatch,
    /// Unknown packet kind, device or message type, or a malformed length.
    UnrecognizedFraming,
    /// The controller answered with an error packet.
    ErrorReply,
    /// No valid reply arrived within the wait or poll budget.
    ReplyTimeout,
    /// Outgoing payload does not fit into a packet.
    PayloadTooLarge,
    /// The bus transfer itself failed.
    Transport(TransportError),
    /// Bus parameters could not be discovered; the device cannot attach.
    Configuration(ConfigError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ChecksumMismatch => write!(f, "checksum mismatch"),
            Self::UnrecognizedFraming => write!(f, "unrecognized framing"),
            Self::ErrorReply => write!(f, "controller returned an error packet"),
            Self::ReplyTimeout => write!(f, "timed out waiting for reply"),
            Self::PayloadTooLarge => write!(f, "payload too large"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Configuration(e) => write!(f, "configuration error: {e}"),
        }
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Checksum { .. } | DecodeError::MessageChecksum => Error::ChecksumMismatch,
            DecodeError::Length => Error::UnrecognizedFraming,
        }
    }
}

impl From<EncodeError> for Error {
    fn from(err: EncodeError) -> Self {
        match err {
            EncodeError::PayloadTooLarge => Error::PayloadTooLarge,
        }
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        Error::Transport(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Configuration(err)
    }
}
