//! Fixed-size SPI packets.
//!
//! # Layout
//!
//! ```text
//! ┌──────┬────────┬──────────┬───────────┬──────────┬─────────────┬─────────┐
//! │ Kind │ Device │ Offset   │ Remaining │ Length   │ Data        │ CRC16   │
//! │ (1B) │ (1B)   │ (2B LE)  │ (2B LE)   │ (2B LE)  │ (246B)      │ (2B LE) │
//! └──────┴────────┴──────────┴───────────┴──────────┴─────────────┴─────────┘
//! ```
//!
//! Every transfer moves exactly [`PACKET_SIZE`] bytes. The packet CRC covers
//! everything but itself; the data region holds one [`Message`].

use crate::crc::crc16;
use crate::message::{
    read_u16, write_message, Message, Request, LENGTH as MSG_LENGTH, MAX_PAYLOAD_LEN,
    MSG_HEADER_LEN,
};

/// Size of every packet on the wire.
pub const PACKET_SIZE: usize = 256;

/// Size of the packet header.
pub const PACKET_HEADER_LEN: usize = 8;

/// Size of the data region holding the message.
pub const PACKET_DATA_LEN: usize = PACKET_SIZE - PACKET_HEADER_LEN - 2;

/// Offset of the trailing packet CRC.
pub const PACKET_CRC_OFFSET: usize = PACKET_SIZE - 2;

const KIND: usize = 0;
const DEVICE: usize = 1;
const OFFSET: usize = 2;
const REMAINING: usize = 4;
const LENGTH: usize = 6;

/// Packet kind (first byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketKind {
    /// Data the controller pushes to the host (key presses, touches).
    Read,
    /// Commands, and the controller's replies to them.
    Write,
    /// The controller rejected a command or had nothing to read.
    Error,
    /// Anything else.
    Unknown(u8),
}

impl PacketKind {
    /// Wire value of this kind.
    #[must_use]
    pub const fn raw(self) -> u8 {
        match self {
            Self::Read => 0x20,
            Self::Write => 0x40,
            Self::Error => 0x80,
            Self::Unknown(raw) => raw,
        }
    }
}

impl From<u8> for PacketKind {
    fn from(raw: u8) -> Self {
        match raw {
            0x20 => Self::Read,
            0x40 => Self::Write,
            0x80 => Self::Error,
            other => Self::Unknown(other),
        }
    }
}

/// Logical device a packet is addressed to or originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Device {
    /// Keyboard.
    Keyboard,
    /// Touchpad.
    Touchpad,
    /// Controller information channel.
    Info,
    /// Anything else.
    Unknown(u8),
}

impl Device {
    /// Wire value of this device.
    #[must_use]
    pub const fn raw(self) -> u8 {
        match self {
            Self::Keyboard => 0x01,
            Self::Touchpad => 0x02,
            Self::Info => 0xD0,
            Self::Unknown(raw) => raw,
        }
    }
}

impl From<u8> for Device {
    fn from(raw: u8) -> Self {
        match raw {
            0x01 => Self::Keyboard,
            0x02 => Self::Touchpad,
            0xD0 => Self::Info,
            other => Self::Unknown(other),
        }
    }
}

/// Error type for packet encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    /// The payload does not fit into a single packet.
    PayloadTooLarge,
}

impl core::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::PayloadTooLarge => write!(f, "payload too large"),
        }
    }
}

/// Error type for packet decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// The packet CRC does not match its contents.
    Checksum {
        /// CRC computed over the received bytes.
        computed: u16,
        /// CRC carried in the packet.
        received: u16,
    },
    /// The message CRC does not match its header and payload.
    MessageChecksum,
    /// The message length does not fit into the packet.
    Length,
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Checksum { computed, received } => write!(
                f,
                "corrupt packet (crc {computed:#06x} != packet crc {received:#06x})"
            ),
            Self::MessageChecksum => write!(f, "corrupt message crc"),
            Self::Length => write!(f, "message length out of range"),
        }
    }
}

/// Encode `request` as a Write packet.
///
/// Fills in the message counter, length, defaulted response length and
/// both checksums. Offset and remaining are always zero.
///
/// # Errors
///
/// Returns [`EncodeError::PayloadTooLarge`] if the payload exceeds
/// [`MAX_PAYLOAD_LEN`]; `out` is left untouched in that case.
pub fn encode(
    request: &Request<'_>,
    counter: u8,
    out: &mut [u8; PACKET_SIZE],
) -> Result<(), EncodeError> {
    if request.payload.len() > MAX_PAYLOAD_LEN {
        return Err(EncodeError::PayloadTooLarge);
    }

    out.fill(0);
    let message_len = write_message(
        request,
        counter,
        &mut out[PACKET_HEADER_LEN..PACKET_CRC_OFFSET],
    );

    out[KIND] = PacketKind::Write.raw();
    out[DEVICE] = request.device.raw();
    out[OFFSET..OFFSET + 2].copy_from_slice(&0u16.to_le_bytes());
    out[REMAINING..REMAINING + 2].copy_from_slice(&0u16.to_le_bytes());
    out[LENGTH..LENGTH + 2].copy_from_slice(&(message_len as u16).to_le_bytes());

    let crc = crc16(&out[..PACKET_CRC_OFFSET]);
    out[PACKET_CRC_OFFSET..].copy_from_slice(&crc.to_le_bytes());
    Ok(())
}

/// A received packet whose packet CRC has been verified.
#[derive(Debug, Clone, Copy)]
pub struct Packet<'a> {
    raw: &'a [u8; PACKET_SIZE],
}

impl<'a> Packet<'a> {
    /// Verify the packet CRC and wrap `raw` in a view.
    ///
    /// Nothing past the checksum is interpreted on failure.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Checksum`] if the CRC does not match.
    pub fn parse(raw: &'a [u8; PACKET_SIZE]) -> Result<Self, DecodeError> {
        let computed = crc16(&raw[..PACKET_CRC_OFFSET]);
        let received = read_u16(raw, PACKET_CRC_OFFSET);
        if computed != received {
            return Err(DecodeError::Checksum { computed, received });
        }
        Ok(Self { raw })
    }

    /// Packet kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> PacketKind {
        PacketKind::from(self.raw[KIND])
    }

    /// Source or target device.
    #[inline]
    #[must_use]
    pub fn device(&self) -> Device {
        Device::from(self.raw[DEVICE])
    }

    /// Offset of this fragment within the logical message.
    #[inline]
    #[must_use]
    pub fn offset(&self) -> u16 {
        read_u16(self.raw, OFFSET)
    }

    /// Bytes of the logical message still to come after this fragment.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> u16 {
        read_u16(self.raw, REMAINING)
    }

    /// Length of the message region in use.
    #[inline]
    #[must_use]
    pub fn length(&self) -> u16 {
        read_u16(self.raw, LENGTH)
    }

    /// Whether this packet is only part of a larger message.
    #[inline]
    #[must_use]
    pub fn is_fragment(&self) -> bool {
        self.offset() != 0 || self.remaining() != 0
    }

    /// The raw data region.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        &self.raw[PACKET_HEADER_LEN..PACKET_CRC_OFFSET]
    }

    /// The raw packet bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8; PACKET_SIZE] {
        self.raw
    }

    /// Parse the message in the data region.
    ///
    /// A complete packet must carry a message that fits the data region and
    /// whose CRC validates. Fragments are not reassembled: the payload is
    /// clamped to the bytes present and the message CRC, which lives in a
    /// later fragment, is not checked.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Length`] if a complete message overruns the
    /// packet, or [`DecodeError::MessageChecksum`] if its CRC is wrong.
    pub fn message(&self) -> Result<Message<'a>, DecodeError> {
        let data = self.data();
        let length = usize::from(read_u16(data, MSG_LENGTH));

        if self.is_fragment() {
            let present = length.min(PACKET_DATA_LEN - MSG_HEADER_LEN);
            return Ok(Message::from_data(data, present));
        }

        if length > MAX_PAYLOAD_LEN {
            return Err(DecodeError::Length);
        }
        let end = MSG_HEADER_LEN + length;
        let received = read_u16(data, end);
        if crc16(&data[..end]) != received {
            return Err(DecodeError::MessageChecksum);
        }
        Ok(Message::from_data(data, length))
    }
}
