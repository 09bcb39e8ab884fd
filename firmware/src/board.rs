//! Board-specific bus description.
//!
//! There is no platform firmware to ask on this board, so the bus
//! properties come from a table with the values MacBook firmware reports.

use defmt::warn;
use embassy_rp::spi;
use topcase_core::{BitOrder, BusConfig, ConfigError, ConfigProvider};

/// Bus properties of the attached topcase.
pub const BOARD_PROPERTIES: [(&str, u64); 8] = [
    ("spiSclkPeriod", 125),
    ("spiWordSize", 8),
    ("spiBitOrder", 1),
    ("spiSPO", 0),
    ("spiSPH", 0),
    ("spiCSDelay", 10),
    ("resetA2RUsec", 5000),
    ("resetRecUsec", 5000),
];

/// [`ConfigProvider`] backed by [`BOARD_PROPERTIES`].
///
/// The controller is wired for SPI only.
pub struct BoardProperties;

impl ConfigProvider for BoardProperties {
    fn usb_enabled(&mut self) -> Option<bool> {
        Some(false)
    }

    fn spi_enabled(&mut self) -> Option<bool> {
        Some(true)
    }

    fn enable_spi(&mut self) -> Result<(), ConfigError> {
        Ok(())
    }

    fn bus_properties(&mut self, visit: &mut dyn FnMut(&str, u64)) -> Result<(), ConfigError> {
        for (key, value) in BOARD_PROPERTIES {
            visit(key, value);
        }
        Ok(())
    }
}

/// Translate a [`BusConfig`] into the RP2040 SPI configuration.
///
/// The RP2040 only shifts MSB first; other word sizes and bit orders are
/// reported and otherwise ignored.
#[must_use]
pub fn spi_config(config: &BusConfig) -> spi::Config {
    if config.word_size != 8 || config.bit_order != BitOrder::MsbFirst {
        warn!(
            "unsupported framing: {} bits, {}",
            config.word_size, config.bit_order
        );
    }

    let mut spi_config = spi::Config::default();
    spi_config.frequency = config.frequency_hz;
    spi_config.polarity = match config.mode.polarity {
        embedded_hal::spi::Polarity::IdleLow => spi::Polarity::IdleLow,
        embedded_hal::spi::Polarity::IdleHigh => spi::Polarity::IdleHigh,
    };
    spi_config.phase = match config.mode.phase {
        embedded_hal::spi::Phase::CaptureOnFirstTransition => spi::Phase::CaptureOnFirstTransition,
        embedded_hal::spi::Phase::CaptureOnSecondTransition => spi::Phase::CaptureOnSecondTransition,
    };
    spi_config
}
