//! Messages carried inside a packet's data region.
//!
//! # Layout
//!
//! ```text
//! ┌──────────┬──────┬─────────┬─────────────────┬──────────┬───────────┬─────────┐
//! │ Type     │ Zero │ Counter │ Response length │ Length   │ Payload   │ CRC16   │
//! │ (2B LE)  │ (1B) │ (1B)    │ (2B LE)         │ (2B LE)  │ (Length)  │ (2B LE) │
//! └──────────┴──────┴─────────┴─────────────────┴──────────┴───────────┴─────────┘
//! ```
//!
//! The message CRC covers the header and payload.

use crate::crc::crc16;
use crate::packet::{Device, PACKET_DATA_LEN};

/// Size of the message header in bytes.
pub const MSG_HEADER_LEN: usize = 8;

/// Size of the trailing message CRC in bytes.
pub const MSG_CRC_LEN: usize = 2;

/// Largest payload that fits into a single packet.
pub const MAX_PAYLOAD_LEN: usize = PACKET_DATA_LEN - MSG_HEADER_LEN - MSG_CRC_LEN;

const TYPE: usize = 0;
const COUNTER: usize = 3;
const RESPONSE_LENGTH: usize = 4;
pub(crate) const LENGTH: usize = 6;

/// Message type field.
///
/// Kept as an open newtype since the controller uses many undocumented types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MessageType(pub u16);

impl MessageType {
    /// Set keyboard LEDs (caps lock).
    pub const KEYBOARD_LED: Self = Self(0x0151);
    /// Switch the touchpad into multitouch reporting mode.
    pub const TOUCHPAD_INIT: Self = Self(0x0252);
    /// Touchpad model information, both as request and reply.
    pub const TOUCHPAD_INFO: Self = Self(0x1020);
}

impl From<u16> for MessageType {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

/// An outgoing message, before counter and checksums are filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request<'a> {
    /// Target device for the packet.
    pub device: Device,
    /// Message type.
    pub kind: MessageType,
    /// Payload bytes, without the message CRC.
    pub payload: &'a [u8],
    /// Expected response size; zero means "same as the request length".
    pub response_length: u16,
}

impl<'a> Request<'a> {
    /// Create a request with a defaulted response length.
    #[must_use]
    pub const fn new(device: Device, kind: MessageType, payload: &'a [u8]) -> Self {
        Self {
            device,
            kind,
            payload,
            response_length: 0,
        }
    }

    /// Set an explicit response length.
    #[must_use]
    pub const fn with_response_length(mut self, response_length: u16) -> Self {
        self.response_length = response_length;
        self
    }
}

impl Request<'static> {
    /// Turn the caps lock LED on or off.
    #[must_use]
    pub const fn keyboard_led(caps_lock: bool) -> Self {
        const ON: [u8; 2] = [0x01, 0x02];
        const OFF: [u8; 2] = [0x01, 0x00];
        let payload: &'static [u8] = if caps_lock { &ON } else { &OFF };
        Self::new(Device::Keyboard, MessageType::KEYBOARD_LED, payload)
    }

    /// Put the touchpad into multitouch mode.
    #[must_use]
    pub const fn touchpad_init() -> Self {
        Self::new(Device::Touchpad, MessageType::TOUCHPAD_INIT, &[0x02, 0x01])
            .with_response_length(0x0002)
    }

    /// Ask the controller for the touchpad model information.
    #[must_use]
    pub const fn touchpad_info() -> Self {
        Self::new(Device::Info, MessageType::TOUCHPAD_INFO, &[]).with_response_length(0x0200)
    }
}

/// Write the message for `request` into the start of `data`.
///
/// Returns the number of bytes used, including the message CRC. The caller
/// must have checked that the payload fits.
pub(crate) fn write_message(request: &Request<'_>, counter: u8, data: &mut [u8]) -> usize {
    let length = request.payload.len() as u16;
    let response_length = if request.response_length == 0 {
        length
    } else {
        request.response_length
    };

    data[TYPE..TYPE + 2].copy_from_slice(&request.kind.0.to_le_bytes());
    data[2] = 0;
    data[COUNTER] = counter;
    data[RESPONSE_LENGTH..RESPONSE_LENGTH + 2].copy_from_slice(&response_length.to_le_bytes());
    data[LENGTH..LENGTH + 2].copy_from_slice(&length.to_le_bytes());

    let end = MSG_HEADER_LEN + request.payload.len();
    data[MSG_HEADER_LEN..end].copy_from_slice(request.payload);

    let crc = crc16(&data[..end]);
    data[end..end + MSG_CRC_LEN].copy_from_slice(&crc.to_le_bytes());
    end + MSG_CRC_LEN
}

/// A borrowed view of a received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message<'a> {
    kind: MessageType,
    counter: u8,
    response_length: u16,
    length: u16,
    payload: &'a [u8],
}

impl<'a> Message<'a> {
    /// Read the header from `data` and borrow up to `payload_len` payload bytes.
    pub(crate) fn from_data(data: &'a [u8], payload_len: usize) -> Self {
        Self {
            kind: MessageType(read_u16(data, TYPE)),
            counter: data[COUNTER],
            response_length: read_u16(data, RESPONSE_LENGTH),
            length: read_u16(data, LENGTH),
            payload: &data[MSG_HEADER_LEN..MSG_HEADER_LEN + payload_len],
        }
    }

    /// Message type.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> MessageType {
        self.kind
    }

    /// Transaction counter assigned by the sender.
    #[inline]
    #[must_use]
    pub fn counter(&self) -> u8 {
        self.counter
    }

    /// Response length field.
    #[inline]
    #[must_use]
    pub fn response_length(&self) -> u16 {
        self.response_length
    }

    /// Payload length as stated in the header.
    ///
    /// For fragments this can exceed [`payload()`](Self::payload)'s length.
    #[inline]
    #[must_use]
    pub fn length(&self) -> u16 {
        self.length
    }

    /// Payload bytes present in this packet.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Copy the message out of the receive buffer.
    #[cfg(feature = "heapless")]
    #[must_use]
    pub fn to_owned_message(&self) -> OwnedMessage {
        let mut payload = heapless::Vec::new();
        // Payload views never exceed MAX_PAYLOAD_LEN.
        let _ = payload.extend_from_slice(self.payload);
        OwnedMessage {
            kind: self.kind,
            counter: self.counter,
            payload,
        }
    }
}

/// An owned copy of a [`Message`], for queueing out of the receive path.
#[cfg(feature = "heapless")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedMessage {
    /// Message type.
    pub kind: MessageType,
    /// Transaction counter.
    pub counter: u8,
    /// Payload bytes.
    pub payload: heapless::Vec<u8, MAX_PAYLOAD_LEN>,
}

#[cfg(all(feature = "heapless", feature = "defmt"))]
impl defmt::Format for OwnedMessage {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "OwnedMessage {{ kind: {}, counter: {}, payload: {=[u8]:02x} }}",
            self.kind,
            self.counter,
            &self.payload[..]
        )
    }
}

#[inline]
pub(crate) fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}
