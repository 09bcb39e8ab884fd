//! Bus transport: one packet transfer with exclusive, scoped bus ownership.
//!
//! The SPI bus is shared with other peripherals. Each transfer acquires it,
//! applies the topcase configuration, moves one buffer and releases it again;
//! nothing is held between transfers and nothing is retried here.

use core::cell::RefCell;

use embassy_embedded_hal::SetConfig;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::{Operation, SpiBus, SpiDevice};

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Send the buffer, discard what comes back.
    Write,
    /// Clock in a buffer's worth of data.
    Read,
    /// Send the buffer and replace it with what comes back.
    Duplex,
}

/// Error type for bus transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// The bus rejected the configuration.
    Config,
    /// Driving chip select failed.
    ChipSelect,
    /// The transfer itself failed.
    Bus,
}

impl core::fmt::Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Config => write!(f, "bus configuration rejected"),
            Self::ChipSelect => write!(f, "chip select failed"),
            Self::Bus => write!(f, "bus transfer failed"),
        }
    }
}

/// A bus the controller can move packets over.
pub trait BusTransport {
    /// Bus configuration applied on every transfer.
    type Config;

    /// Acquire the bus, apply `config`, transfer `buf` and release the bus.
    ///
    /// The bus must be released on every exit path, including errors.
    fn transfer(
        &mut self,
        direction: Direction,
        config: &Self::Config,
        buf: &mut [u8],
    ) -> Result<(), TransportError>;
}

/// Transport over an SPI bus shared with other devices.
///
/// The bus lives in a blocking mutex so other drivers can use it between
/// topcase transfers. Each transfer reconfigures the bus, since the last
/// user may have left it at another speed or mode.
pub struct SharedSpiTransport<'a, M: RawMutex, BUS, CS, D> {
    bus: &'a Mutex<M, RefCell<BUS>>,
    cs: CS,
    delay: D,
    cs_delay_us: u32,
}

impl<'a, M: RawMutex, BUS, CS, D> SharedSpiTransport<'a, M, BUS, CS, D> {
    /// Create a transport using chip select `cs` on the shared `bus`.
    ///
    /// `cs_delay_us` is waited after asserting chip select.
    pub fn new(bus: &'a Mutex<M, RefCell<BUS>>, cs: CS, delay: D, cs_delay_us: u32) -> Self {
        Self {
            bus,
            cs,
            delay,
            cs_delay_us,
        }
    }
}

impl<M, BUS, CS, D> BusTransport for SharedSpiTransport<'_, M, BUS, CS, D>
where
    M: RawMutex,
    BUS: SpiBus + SetConfig,
    CS: OutputPin,
    D: DelayNs,
{
    type Config = BUS::Config;

    fn transfer(
        &mut self,
        direction: Direction,
        config: &Self::Config,
        buf: &mut [u8],
    ) -> Result<(), TransportError> {
        let Self {
            bus,
            cs,
            delay,
            cs_delay_us,
        } = self;

        bus.lock(|bus| {
            let mut bus = bus.borrow_mut();
            bus.set_config(config).map_err(|_| TransportError::Config)?;

            cs.set_low().map_err(|_| TransportError::ChipSelect)?;
            if *cs_delay_us > 0 {
                delay.delay_us(*cs_delay_us);
            }

            let op_res = match direction {
                Direction::Write => bus.write(buf),
                Direction::Read => bus.read(buf),
                Direction::Duplex => bus.transfer_in_place(buf),
            };
            // Flush before releasing chip select, even after a failed op.
            let flush_res = bus.flush();
            let cs_res = cs.set_high();

            op_res.map_err(|_| TransportError::Bus)?;
            flush_res.map_err(|_| TransportError::Bus)?;
            cs_res.map_err(|_| TransportError::ChipSelect)?;
            Ok(())
        })
    }
}

/// Transport over an [`SpiDevice`] that already arbitrates the bus.
///
/// The device applies its own configuration, so [`BusTransport::Config`]
/// is `()`.
pub struct SpiDeviceTransport<DEV> {
    device: DEV,
}

impl<DEV> SpiDeviceTransport<DEV> {
    /// Wrap an SPI device.
    pub fn new(device: DEV) -> Self {
        Self { device }
    }

    /// Release the wrapped device.
    pub fn into_inner(self) -> DEV {
        self.device
    }
}

impl<DEV: SpiDevice> BusTransport for SpiDeviceTransport<DEV> {
    type Config = ();

    fn transfer(
        &mut self,
        direction: Direction,
        _config: &(),
        buf: &mut [u8],
    ) -> Result<(), TransportError> {
        let op = match direction {
            Direction::Write => Operation::Write(buf),
            Direction::Read => Operation::Read(buf),
            Direction::Duplex => Operation::TransferInPlace(buf),
        };
        self.device
            .transaction(&mut [op])
            .map_err(|_| TransportError::Bus)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use core::convert::Infallible;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use embedded_hal::spi::ErrorKind;
    use std::cell::RefCell as StdRefCell;
    use std::rc::Rc;
    use std::vec::Vec;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Config(u32),
        CsLow,
        CsHigh,
        Delay(u32),
        Write(Vec<u8>),
        Read(usize),
        Transfer(Vec<u8>),
        Flush,
    }

    type Log = Rc<StdRefCell<Vec<Event>>>;

    struct MockBus {
        log: Log,
        fail_ops: bool,
        reject_config: bool,
    }

    impl embedded_hal::spi::ErrorType for MockBus {
        type Error = ErrorKind;
    }

    impl SpiBus for MockBus {
        fn read(&mut self, words: &mut [u8]) -> Result<(), ErrorKind> {
            self.log.borrow_mut().push(Event::Read(words.len()));
            if self.fail_ops {
                return Err(ErrorKind::Overrun);
            }
            words.fill(0x5A);
            Ok(())
        }

        fn write(&mut self, words: &[u8]) -> Result<(), ErrorKind> {
            self.log.borrow_mut().push(Event::Write(words.to_vec()));
            if self.fail_ops {
                return Err(ErrorKind::Overrun);
            }
            Ok(())
        }

        fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), ErrorKind> {
            read.copy_from_slice(write);
            Ok(())
        }

        fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), ErrorKind> {
            self.log.borrow_mut().push(Event::Transfer(words.to_vec()));
            for w in words.iter_mut() {
                *w = !*w;
            }
            Ok(())
        }

        fn flush(&mut self) -> Result<(), ErrorKind> {
            self.log.borrow_mut().push(Event::Flush);
            Ok(())
        }
    }

    impl SetConfig for MockBus {
        type Config = u32;
        type ConfigError = ();

        fn set_config(&mut self, config: &u32) -> Result<(), ()> {
            if self.reject_config {
                return Err(());
            }
            self.log.borrow_mut().push(Event::Config(*config));
            Ok(())
        }
    }

    struct MockPin {
        log: Log,
    }

    impl embedded_hal::digital::ErrorType for MockPin {
        type Error = Infallible;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.log.borrow_mut().push(Event::CsLow);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.log.borrow_mut().push(Event::CsHigh);
            Ok(())
        }
    }

    struct MockDelay {
        log: Log,
    }

    impl DelayNs for MockDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.log.borrow_mut().push(Event::Delay(ns / 1000));
        }
    }

    fn setup(fail_ops: bool, reject_config: bool) -> (Log, Mutex<NoopRawMutex, RefCell<MockBus>>) {
        let log: Log = Rc::new(StdRefCell::new(Vec::new()));
        let bus = Mutex::new(RefCell::new(MockBus {
            log: log.clone(),
            fail_ops,
            reject_config,
        }));
        (log, bus)
    }

    #[test]
    fn test_write_sequence() {
        let (log, bus) = setup(false, false);
        let mut transport = SharedSpiTransport::new(
            &bus,
            MockPin { log: log.clone() },
            MockDelay { log: log.clone() },
            10,
        );

        let mut buf = [1u8, 2, 3];
        transport
            .transfer(Direction::Write, &8_000_000, &mut buf)
            .unwrap();

        assert_eq!(
            *log.borrow(),
            [
                Event::Config(8_000_000),
                Event::CsLow,
                Event::Delay(10),
                Event::Write(std::vec![1, 2, 3]),
                Event::Flush,
                Event::CsHigh,
            ]
        );
    }

    #[test]
    fn test_read_fills_buffer() {
        let (log, bus) = setup(false, false);
        let mut transport = SharedSpiTransport::new(
            &bus,
            MockPin { log: log.clone() },
            MockDelay { log: log.clone() },
            0,
        );

        let mut buf = [0u8; 4];
        transport.transfer(Direction::Read, &1, &mut buf).unwrap();
        assert_eq!(buf, [0x5A; 4]);
        assert!(!log.borrow().contains(&Event::Delay(0)));
    }

    #[test]
    fn test_duplex_transfers_in_place() {
        let (log, bus) = setup(false, false);
        let mut transport = SharedSpiTransport::new(
            &bus,
            MockPin { log: log.clone() },
            MockDelay { log: log.clone() },
            0,
        );

        let mut buf = [0x0Fu8, 0xF0];
        transport.transfer(Direction::Duplex, &1, &mut buf).unwrap();
        assert_eq!(buf, [0xF0, 0x0F]);
    }

    #[test]
    fn test_chip_select_released_on_bus_error() {
        let (log, bus) = setup(true, false);
        let mut transport = SharedSpiTransport::new(
            &bus,
            MockPin { log: log.clone() },
            MockDelay { log: log.clone() },
            0,
        );

        let mut buf = [0u8; 2];
        assert_eq!(
            transport.transfer(Direction::Write, &1, &mut buf),
            Err(TransportError::Bus)
        );
        assert_eq!(log.borrow().last(), Some(&Event::CsHigh));
    }

    #[test]
    fn test_rejected_config_never_selects() {
        let (log, bus) = setup(false, true);
        let mut transport = SharedSpiTransport::new(
            &bus,
            MockPin { log: log.clone() },
            MockDelay { log: log.clone() },
            0,
        );

        let mut buf = [0u8; 2];
        assert_eq!(
            transport.transfer(Direction::Write, &1, &mut buf),
            Err(TransportError::Config)
        );
        assert!(log.borrow().is_empty());
    }

    struct MockDevice {
        ops: Vec<&'static str>,
    }

    impl embedded_hal::spi::ErrorType for MockDevice {
        type Error = ErrorKind;
    }

    impl SpiDevice for MockDevice {
        fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), ErrorKind> {
            for op in operations {
                match op {
                    Operation::Write(_) => self.ops.push("write"),
                    Operation::Read(buf) => {
                        buf.fill(0xAB);
                        self.ops.push("read");
                    }
                    Operation::TransferInPlace(_) => self.ops.push("transfer"),
                    _ => return Err(ErrorKind::Other),
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_spi_device_transport() {
        let mut transport = SpiDeviceTransport::new(MockDevice { ops: Vec::new() });
        let mut buf = [0u8; 3];
        transport.transfer(Direction::Write, &(), &mut buf).unwrap();
        transport.transfer(Direction::Read, &(), &mut buf).unwrap();
        assert_eq!(buf, [0xAB; 3]);
        assert_eq!(transport.into_inner().ops, ["write", "read"]);
    }
}
