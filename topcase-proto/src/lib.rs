//! Wire format for the Apple SPI "topcase" keyboard/touchpad controller.
//!
//! The controller multiplexes a keyboard, a touchpad and an information
//! channel over one SPI link. Every transfer is a fixed 256-byte packet:
//!
//! - **CRC**: [`crc16()`] - CRC-16/ARC over packets and messages
//! - **Packets**: [`encode()`] builds an outgoing Write packet, [`Packet::parse()`]
//!   verifies and views an incoming one
//! - **Messages**: [`Request`] describes an outgoing message, [`Message`] is a
//!   borrowed view of a received one
//! - **Logging**: [`HexDump`] renders raw packets
//!
//! # Packet Format
//!
//! ```text
//! [kind:1][device:1][offset:2][remaining:2][length:2][message:246][crc16:2]
//! ```
//!
//! with the message laid out as
//!
//! ```text
//! [type:2][zero:1][counter:1][response_length:2][length:2][payload][crc16:2]
//! ```
//!
//! All multi-byte fields are little-endian.
//!
//! # Example
//!
//! ```
//! use topcase_proto::{encode, Packet, Request, PACKET_SIZE};
//!
//! let mut buf = [0u8; PACKET_SIZE];
//! encode(&Request::keyboard_led(true), 0, &mut buf).unwrap();
//!
//! let packet = Packet::parse(&buf).unwrap();
//! let message = packet.message().unwrap();
//! assert_eq!(message.payload(), &[0x01, 0x02]);
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting (for embedded logging)
//! - **`heapless`**: Enable [`OwnedMessage`] copies of received messages
//!
//! # No-std Support
//!
//! This crate is `#![no_std]` by default and uses no heap allocations.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod crc;
pub mod dump;
pub mod message;
pub mod packet;

pub use crc::crc16;
pub use dump::HexDump;
#[cfg(feature = "heapless")]
pub use message::OwnedMessage;
pub use message::{Message, MessageType, Request, MAX_PAYLOAD_LEN, MSG_CRC_LEN, MSG_HEADER_LEN};
pub use packet::{
    encode, DecodeError, Device, EncodeError, Packet, PacketKind, PACKET_DATA_LEN,
    PACKET_HEADER_LEN, PACKET_SIZE,
};
