//! Apple SPI topcase driver for RP2040.
//!
//! Drives a MacBook topcase (keyboard + trackpad controller) over SPI0 and
//! logs what it reports.
//!
//! # Hardware Configuration
//!
//! | Function  | GPIO | Description |
//! |-----------|------|-------------|
//! | SPI0 RX   | 16   | Controller to host |
//! | SPI0 CS   | 17   | Chip select (active low) |
//! | SPI0 SCK  | 18   | Clock |
//! | SPI0 TX   | 19   | Host to controller |
//! | IRQ       | 20   | Controller interrupt (falling edge) |
//! | RESET     | 21   | Controller reset (active low) |
//!
//! # Architecture
//!
//! - **Main**: probes the bus, resets the controller, and sends the
//!   start-up commands, polling for the first reply before the interrupt
//!   task runs
//! - **Interrupt Task**: waits on the IRQ line and runs the receive path
//! - **Keyboard/Trackpad Tasks**: drain the sink queues
//!
//! The sinks run inside the receive path, so they only copy each message
//! into an [`embassy_sync::channel::Channel`].
//!
//! # Features
//!
//! - **`dev-panic`** (default): Use `panic-probe` for development (prints panic info via RTT)
//! - **`prod-panic`**: Use `panic-reset` for production (silent watchdog reset)

#![no_std]

pub use topcase_core::{
    probe, BusConfig, BusParameters, Delivery, Error, KeyboardSink, ReplyMode, SharedSpiTransport,
    Topcase, TrackpadSink, WarmWait,
};
pub use topcase_proto::{OwnedMessage, Request};

pub mod board;
pub mod sinks;

pub use board::{spi_config, BoardProperties, BOARD_PROPERTIES};
pub use sinks::{ForwardingKeyboard, ForwardingTrackpad, MessageQueue, TrackpadEvent, TrackpadQueue};
