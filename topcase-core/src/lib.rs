//! Platform-agnostic driver core for the Apple SPI topcase controller.
//!
//! Builds on the wire format in [`topcase_proto`] and adds everything needed
//! to run the link, without committing to a HAL or an executor.
//!
//! # Overview
//!
//! - [`config`]: Bus parameter discovery ([`probe`], [`BusParameters`], [`BusConfig`])
//! - [`transport`]: Per-transfer bus access ([`BusTransport`], [`SharedSpiTransport`])
//! - [`sink`]: Keyboard and trackpad consumers ([`KeyboardSink`], [`TrackpadSink`])
//! - [`router`]: Received packet dispatch ([`route`])
//! - [`wait`]: Reply strategies ([`ColdPoll`], [`WarmWait`], [`ReplyMode`])
//! - [`controller`]: The transaction coordinator ([`Topcase`])
//!
//! # Example
//!
//! ```rust,ignore
//! let params = probe(&mut provider, &mut delay)?;
//! let config = params.bus_config();
//! let topcase: Topcase<'_, CriticalSectionRawMutex, _> =
//!     Topcase::new(SharedSpiTransport::new(&SPI_BUS, cs, delay, config.cs_delay_us), spi_config);
//! topcase.attach_trackpad(&trackpad);
//!
//! // Before the executor runs, poll for the reply.
//! topcase.send(&Request::touchpad_info(), &mut ReplyMode::select(false, Delay)).await?;
//!
//! // From the interrupt line handler:
//! let _ = topcase.on_interrupt();
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Log through defmt
//! - **`log`**: Log through the `log` facade
//!
//! # No-std Support
//!
//! This crate is `#![no_std]` by default and uses no heap allocations.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

// Must come first so the logging macros are visible to the other modules.
#[macro_use]
mod fmt;

pub mod config;
pub mod controller;
pub mod error;
pub mod router;
pub mod sink;
pub mod transport;
pub mod wait;

pub use config::{probe, BitOrder, BusConfig, BusParameters, ConfigError, ConfigProvider};
pub use controller::{Phase, Topcase};
pub use error::Error;
pub use router::{route, Delivery};
pub use sink::{KeyboardSink, Sinks, TrackpadSink};
pub use transport::{BusTransport, Direction, SharedSpiTransport, SpiDeviceTransport, TransportError};
pub use wait::{ColdPoll, NoReply, ReplyMode, ReplySource, ReplyWait, WarmWait};
