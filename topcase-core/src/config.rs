//! Bus parameter discovery.
//!
//! The platform firmware describes the SPI link as a list of named integer
//! properties. They are queried once when the controller attaches, turned
//! into [`BusParameters`], and from there into the [`BusConfig`] applied to
//! every transfer.

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{Mode, Phase, Polarity};

/// Time to let the controller settle after switching it to SPI mode.
pub const SPI_ENABLE_SETTLE_US: u32 = 500;

/// Error type for configuration discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The platform exposes no bus properties for this device.
    Unavailable,
    /// The controller is attached over USB instead; SPI must stay off.
    UsbInterfaceActive,
    /// Switching the controller to SPI mode failed.
    EnableFailed,
    /// A required property is missing.
    MissingParameter(&'static str),
    /// A property has an unusable value.
    InvalidParameter(&'static str),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "bus properties unavailable"),
            Self::UsbInterfaceActive => write!(f, "USB interface active"),
            Self::EnableFailed => write!(f, "could not enable SPI mode"),
            Self::MissingParameter(key) => write!(f, "missing bus property {key}"),
            Self::InvalidParameter(key) => write!(f, "invalid bus property {key}"),
        }
    }
}

/// Bit order on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitOrder {
    /// Most significant bit first.
    MsbFirst,
    /// Least significant bit first.
    LsbFirst,
}

/// Electrical and timing parameters of the SPI link, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusParameters {
    /// Clock period in nanoseconds.
    pub sclk_period_ns: u64,
    /// Bits per word.
    pub word_size: u8,
    /// Bit order.
    pub bit_order: BitOrder,
    /// Clock idles high (CPOL).
    pub clock_polarity: bool,
    /// Data captured on the second clock edge (CPHA).
    pub clock_phase: bool,
    /// Delay after asserting chip select, in microseconds.
    pub cs_delay_us: u32,
    /// Reset assert-to-release time, in microseconds.
    pub reset_assert_us: u32,
    /// Recovery time after reset, in microseconds.
    pub reset_recovery_us: u32,
}

/// Bus configuration derived from [`BusParameters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    /// Clock frequency in Hz.
    pub frequency_hz: u32,
    /// Bits per word.
    pub word_size: u8,
    /// Bit order.
    pub bit_order: BitOrder,
    /// Clock polarity and phase.
    pub mode: Mode,
    /// Delay after asserting chip select, in microseconds.
    pub cs_delay_us: u32,
}

impl BusParameters {
    /// Resolve parameters from `(key, value)` property pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingParameter`] or
    /// [`ConfigError::InvalidParameter`] if the clock period or word size is
    /// absent or unusable.
    pub fn from_properties<'k>(
        properties: impl IntoIterator<Item = (&'k str, u64)>,
    ) -> Result<Self, ConfigError> {
        let mut resolver = ParameterResolver::default();
        for (key, value) in properties {
            resolver.apply(key, value);
        }
        resolver.finish()
    }

    /// Query the platform for the bus properties and resolve them.
    ///
    /// # Errors
    ///
    /// Propagates provider failures and the errors of [`from_properties`](Self::from_properties).
    pub fn discover<P: ConfigProvider + ?Sized>(provider: &mut P) -> Result<Self, ConfigError> {
        let mut resolver = ParameterResolver::default();
        provider.bus_properties(&mut |key, value| {
            resolver.apply(key, value);
        })?;
        resolver.finish()
    }

    /// Derive the configuration applied to every transfer.
    #[must_use]
    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            frequency_hz: (1_000_000_000 / self.sclk_period_ns) as u32,
            word_size: self.word_size,
            bit_order: self.bit_order,
            mode: Mode {
                polarity: if self.clock_polarity {
                    Polarity::IdleHigh
                } else {
                    Polarity::IdleLow
                },
                phase: if self.clock_phase {
                    Phase::CaptureOnSecondTransition
                } else {
                    Phase::CaptureOnFirstTransition
                },
            },
            cs_delay_us: self.cs_delay_us,
        }
    }
}

/// Accumulates bus properties by name.
#[derive(Debug, Default)]
pub struct ParameterResolver {
    sclk_period: Option<u64>,
    word_size: Option<u64>,
    bit_order: Option<u64>,
    spo: Option<u64>,
    sph: Option<u64>,
    cs_delay: Option<u64>,
    reset_assert: Option<u64>,
    reset_recovery: Option<u64>,
}

impl ParameterResolver {
    /// Record one property. Returns `false` for keys that are not understood.
    pub fn apply(&mut self, key: &str, value: u64) -> bool {
        let slot = match key {
            "spiSclkPeriod" => &mut self.sclk_period,
            "spiWordSize" => &mut self.word_size,
            "spiBitOrder" => &mut self.bit_order,
            "spiSPO" => &mut self.spo,
            "spiSPH" => &mut self.sph,
            "spiCSDelay" => &mut self.cs_delay,
            "resetA2RUsec" => &mut self.reset_assert,
            "resetRecUsec" => &mut self.reset_recovery,
            _ => {
                debug!("unknown bus property {}", key);
                return false;
            }
        };
        *slot = Some(value);
        true
    }

    /// Validate and produce the parameters.
    ///
    /// # Errors
    ///
    /// See [`BusParameters::from_properties`].
    pub fn finish(self) -> Result<BusParameters, ConfigError> {
        let sclk_period_ns = self
            .sclk_period
            .ok_or(ConfigError::MissingParameter("spiSclkPeriod"))?;
        if sclk_period_ns == 0 {
            return Err(ConfigError::InvalidParameter("spiSclkPeriod"));
        }

        let word_size = self
            .word_size
            .ok_or(ConfigError::MissingParameter("spiWordSize"))?;
        let word_size = match u8::try_from(word_size) {
            Ok(bits @ 1..=32) => bits,
            _ => return Err(ConfigError::InvalidParameter("spiWordSize")),
        };

        Ok(BusParameters {
            sclk_period_ns,
            word_size,
            bit_order: match self.bit_order {
                Some(0) => BitOrder::LsbFirst,
                _ => BitOrder::MsbFirst,
            },
            clock_polarity: self.spo.unwrap_or(0) != 0,
            clock_phase: self.sph.unwrap_or(0) != 0,
            cs_delay_us: clamp_u32(self.cs_delay),
            reset_assert_us: clamp_u32(self.reset_assert),
            reset_recovery_us: clamp_u32(self.reset_recovery),
        })
    }
}

fn clamp_u32(value: Option<u64>) -> u32 {
    value.map_or(0, |v| u32::try_from(v).unwrap_or(u32::MAX))
}

/// Platform firmware interface consulted when the controller attaches.
pub trait ConfigProvider {
    /// Whether the controller is currently attached over USB, if known.
    fn usb_enabled(&mut self) -> Option<bool>;

    /// Whether the controller's SPI interface is enabled, if known.
    fn spi_enabled(&mut self) -> Option<bool>;

    /// Switch the controller to SPI mode.
    fn enable_spi(&mut self) -> Result<(), ConfigError>;

    /// Report every bus property as a `(key, value)` pair.
    ///
    /// Returns [`ConfigError::Unavailable`] if the platform has none.
    fn bus_properties(&mut self, visit: &mut dyn FnMut(&str, u64)) -> Result<(), ConfigError>;
}

/// Decide whether the controller can be driven over SPI and resolve its bus.
///
/// Refuses to attach while the USB interface is active. If SPI mode is
/// off it is switched on and given [`SPI_ENABLE_SETTLE_US`] to settle.
///
/// # Errors
///
/// Any error means the device must not attach.
pub fn probe<P, D>(provider: &mut P, delay: &mut D) -> Result<BusParameters, ConfigError>
where
    P: ConfigProvider + ?Sized,
    D: DelayNs,
{
    if provider.usb_enabled() == Some(true) {
        info!("not attaching, USB interface enabled");
        return Err(ConfigError::UsbInterfaceActive);
    }

    if provider.spi_enabled() == Some(false) {
        provider.enable_spi().map_err(|e| {
            warn!("couldn't enable SPI mode");
            e
        })?;
        delay.delay_us(SPI_ENABLE_SETTLE_US);
    }

    let params = BusParameters::discover(provider)?;
    debug!(
        "bus: period {} ns, {} bits, spo {}, sph {}",
        params.sclk_period_ns,
        params.word_size,
        params.clock_polarity,
        params.clock_phase
    );
    Ok(params)
}
