//! Transaction coordinator.
//!
//! [`Topcase`] owns the link to one controller: it serializes senders,
//! assigns message counters, moves packets through a [`BusTransport`], and
//! routes everything it receives to the attached sinks.
//!
//! A transaction goes Idle → Sending → WaitingForReply → Idle. The busy lock
//! is held for the whole transaction, so at most one send is ever past the
//! Idle phase. The receive path ([`Topcase::on_interrupt`]) never takes the
//! busy lock: it runs whether or not a send is outstanding, because the
//! keyboard and trackpad report input unsolicited.
//!
//! ```text
//!   send() ──lock──▶ Sending ──write──▶ WaitingForReply ──ReplyWait──▶ Idle
//!                                              ▲
//!   on_interrupt() ── read ── parse ── route ──┘ (signal)
//! ```

use core::cell::{Cell, RefCell};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::mutex::Mutex as BusyLock;
use embassy_sync::signal::Signal;
use topcase_proto::{encode, HexDump, Packet, Request, PACKET_SIZE};

use crate::error::Error;
use crate::router::{route, Delivery};
use crate::sink::{KeyboardSink, Sinks, TrackpadSink};
use crate::transport::{BusTransport, Direction};
use crate::wait::{ReplySource, ReplyWait};

/// Where the current transaction is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// No transaction in progress.
    Idle,
    /// Encoding and writing the request.
    Sending,
    /// Request written, waiting for the reply.
    WaitingForReply,
}

struct TransactionState {
    counter: u16,
    phase: Phase,
    last_receive_error: bool,
    last_rx: [u8; PACKET_SIZE],
}

/// Protocol engine for one topcase controller.
///
/// `M` selects the raw mutex; use `CriticalSectionRawMutex` when
/// [`on_interrupt`](Self::on_interrupt) runs in interrupt context and
/// `NoopRawMutex` when everything runs on one executor.
pub struct Topcase<'s, M: RawMutex, T: BusTransport> {
    transport: Mutex<M, RefCell<T>>,
    bus_config: T::Config,
    busy: BusyLock<M, ()>,
    state: Mutex<M, RefCell<TransactionState>>,
    reply: Signal<M, Result<(), Error>>,
    keyboard: Mutex<M, Cell<Option<&'s dyn KeyboardSink>>>,
    trackpad: Mutex<M, Cell<Option<&'s dyn TrackpadSink>>>,
}

impl<'s, M: RawMutex, T: BusTransport> Topcase<'s, M, T> {
    /// Create the engine. `bus_config` is applied on every transfer.
    pub fn new(transport: T, bus_config: T::Config) -> Self {
        Self {
            transport: Mutex::new(RefCell::new(transport)),
            bus_config,
            busy: BusyLock::new(()),
            state: Mutex::new(RefCell::new(TransactionState {
                counter: 0,
                phase: Phase::Idle,
                last_receive_error: false,
                last_rx: [0; PACKET_SIZE],
            })),
            reply: Signal::new(),
            keyboard: Mutex::new(Cell::new(None)),
            trackpad: Mutex::new(Cell::new(None)),
        }
    }

    /// Send `request` and wait for its reply as `wait` dictates.
    ///
    /// Concurrent callers queue on the busy lock. The message counter is
    /// consumed once the request encodes, whether or not the transfer and
    /// the wait succeed. Every exit path returns the engine to
    /// [`Phase::Idle`].
    ///
    /// # Errors
    ///
    /// - [`Error::PayloadTooLarge`] if the request does not fit a packet
    /// - [`Error::Transport`] if the write transfer fails
    /// - whatever `wait` reports: [`Error::ReplyTimeout`], or the receive
    ///   error of the reply packet
    pub async fn send<W: ReplyWait>(&self, request: &Request<'_>, wait: &mut W) -> Result<(), Error> {
        let _busy = self.busy.lock().await;
        // Dropped before `_busy`, also when the send future is cancelled.
        let _idle = IdleOnDrop(&self.state);
        self.set_phase(Phase::Sending);

        let result = self.transact(request, wait).await;

        if let Err(e) = result {
            debug!("send {:#x} failed: {:?}", request.kind.0, e);
        }
        result
    }

    async fn transact<W: ReplyWait>(&self, request: &Request<'_>, wait: &mut W) -> Result<(), Error> {
        let mut packet = [0u8; PACKET_SIZE];
        let counter = self.state.lock(|state| state.borrow().counter);
        // Only the low byte goes on the wire.
        encode(request, counter as u8, &mut packet)?;
        self.state
            .lock(|state| state.borrow_mut().counter = counter.wrapping_add(1));
        trace!("tx {}", HexDump(&packet));

        self.reply.reset();
        self.transport.lock(|transport| {
            transport
                .borrow_mut()
                .transfer(Direction::Write, &self.bus_config, &mut packet)
        })?;

        if !W::EXPECTS_REPLY {
            return Ok(());
        }
        self.set_phase(Phase::WaitingForReply);
        wait.wait(self).await
    }

    /// Receive path: read one packet, route it, wake the waiting sender.
    ///
    /// Call this when the controller pulls its interrupt line. Runs to
    /// completion without suspending; sinks are invoked from inside it.
    /// The outcome is also recorded as the last-receive-error flag.
    pub fn on_interrupt(&self) -> Result<Delivery, Error> {
        let result = self.receive_packet();
        self.reply.signal(result.map(|_| ()));
        result
    }

    fn receive_packet(&self) -> Result<Delivery, Error> {
        let mut raw = [0u8; PACKET_SIZE];
        let read = self.transport.lock(|transport| {
            transport
                .borrow_mut()
                .transfer(Direction::Read, &self.bus_config, &mut raw)
        });

        let result = match read {
            Ok(()) => {
                self.state.lock(|state| state.borrow_mut().last_rx = raw);
                self.parse_and_route(&raw)
            }
            Err(e) => {
                warn!("read transfer failed: {}", e);
                Err(e.into())
            }
        };
        self.state
            .lock(|state| state.borrow_mut().last_receive_error = result.is_err());
        result
    }

    fn parse_and_route(&self, raw: &[u8; PACKET_SIZE]) -> Result<Delivery, Error> {
        trace!("rx {}", HexDump(raw));

        let packet = match Packet::parse(raw) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("dropping corrupt packet: {}", e);
                return Err(e.into());
            }
        };
        route(&packet, &self.sinks())
    }

    fn sinks(&self) -> Sinks<'s> {
        Sinks {
            keyboard: self.keyboard.lock(Cell::get),
            trackpad: self.trackpad.lock(Cell::get),
        }
    }

    fn set_phase(&self, phase: Phase) {
        self.state.lock(|state| state.borrow_mut().phase = phase);
    }

    /// Attach the keyboard sink, replacing any previous one.
    pub fn attach_keyboard(&self, sink: &'s dyn KeyboardSink) {
        self.keyboard.lock(|slot| slot.set(Some(sink)));
    }

    /// Detach the keyboard sink. Keyboard reports are dropped from now on.
    pub fn detach_keyboard(&self) {
        self.keyboard.lock(|slot| slot.set(None));
    }

    /// Attach the trackpad sink, replacing any previous one.
    pub fn attach_trackpad(&self, sink: &'s dyn TrackpadSink) {
        self.trackpad.lock(|slot| slot.set(Some(sink)));
    }

    /// Detach the trackpad sink.
    pub fn detach_trackpad(&self) {
        self.trackpad.lock(|slot| slot.set(None));
    }

    /// Current transaction phase.
    pub fn phase(&self) -> Phase {
        self.state.lock(|state| state.borrow().phase)
    }

    /// Whether the most recent receive cycle failed.
    pub fn last_receive_error(&self) -> bool {
        self.state.lock(|state| state.borrow().last_receive_error)
    }

    /// Counter the next request will carry.
    pub fn counter(&self) -> u16 {
        self.state.lock(|state| state.borrow().counter)
    }

    /// Copy of the most recently received raw packet.
    pub fn last_rx(&self) -> [u8; PACKET_SIZE] {
        self.state.lock(|state| state.borrow().last_rx)
    }
}

/// Puts the transaction state back to Idle when a send ends, however it ends.
struct IdleOnDrop<'a, M: RawMutex>(&'a Mutex<M, RefCell<TransactionState>>);

impl<M: RawMutex> Drop for IdleOnDrop<'_, M> {
    fn drop(&mut self) {
        self.0.lock(|state| state.borrow_mut().phase = Phase::Idle);
    }
}

impl<M: RawMutex, T: BusTransport> ReplySource for Topcase<'_, M, T> {
    fn receive(&self) -> Result<(), Error> {
        self.receive_packet().map(|_| ())
    }

    async fn reply(&self) -> Result<(), Error> {
        self.reply.wait().await
    }
}
