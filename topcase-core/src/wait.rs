//! How a sender waits for its reply.
//!
//! The controller cannot tell by itself whether the executor is running yet.
//! Before it is, nothing will ever service the interrupt line, so the sender
//! has to pull the reply off the bus itself ([`ColdPoll`]). Once it is, the
//! interrupt path routes the reply and the sender just waits for the signal
//! ([`WarmWait`]). Callers pick one per send; [`ReplyMode::select`] does so
//! from a single flag.

use core::future::Future;

use embassy_time::{with_timeout, Duration};
use embedded_hal::delay::DelayNs;

use crate::error::Error;

/// Number of receive attempts made by [`ColdPoll`].
pub const POLL_ATTEMPTS: usize = 10;

/// Delay before each [`ColdPoll`] attempt, in microseconds.
pub const POLL_INTERVAL_US: u32 = 10;

/// Default bound for [`WarmWait`].
pub const REPLY_TIMEOUT: Duration = Duration::from_millis(10);

/// The receive side of a controller, as seen by a waiting sender.
pub trait ReplySource {
    /// Run one receive cycle synchronously: read a packet and route it.
    fn receive(&self) -> Result<(), Error>;

    /// Resolve with the outcome of the next receive cycle run by the
    /// interrupt path.
    fn reply(&self) -> impl Future<Output = Result<(), Error>>;
}

/// Strategy for the WaitingForReply phase of a send.
pub trait ReplyWait {
    /// `false` if the send completes as soon as the write transfer is done.
    const EXPECTS_REPLY: bool = true;

    /// Wait for the reply to the request that was just written.
    fn wait<R: ReplySource>(&mut self, source: &R) -> impl Future<Output = Result<(), Error>>;
}

/// Fire and forget.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReply;

impl ReplyWait for NoReply {
    const EXPECTS_REPLY: bool = false;

    async fn wait<R: ReplySource>(&mut self, _source: &R) -> Result<(), Error> {
        Ok(())
    }
}

/// Busy-poll the bus for the reply.
///
/// For use before interrupts are serviced. Never suspends: each attempt
/// burns [`POLL_INTERVAL_US`] on the delay and then reads synchronously.
/// Stops at the first packet that routes cleanly.
pub struct ColdPoll<D> {
    delay: D,
}

impl<D: DelayNs> ColdPoll<D> {
    /// Create a poller using `delay` between attempts.
    pub fn new(delay: D) -> Self {
        Self { delay }
    }
}

impl<D: DelayNs> ReplyWait for ColdPoll<D> {
    async fn wait<R: ReplySource>(&mut self, source: &R) -> Result<(), Error> {
        for attempt in 0..POLL_ATTEMPTS {
            self.delay.delay_us(POLL_INTERVAL_US);
            match source.receive() {
                Ok(()) => return Ok(()),
                Err(e) => trace!("poll attempt {}: {:?}", attempt, e),
            }
        }
        warn!("no valid reply after {} polls", POLL_ATTEMPTS);
        Err(Error::ReplyTimeout)
    }
}

/// Suspend until the interrupt path signals a reply, with a bound.
#[derive(Debug, Clone, Copy)]
pub struct WarmWait {
    timeout: Duration,
}

impl WarmWait {
    /// Wait at most [`REPLY_TIMEOUT`].
    pub const fn new() -> Self {
        Self {
            timeout: REPLY_TIMEOUT,
        }
    }

    /// Wait at most `timeout`.
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for WarmWait {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyWait for WarmWait {
    async fn wait<R: ReplySource>(&mut self, source: &R) -> Result<(), Error> {
        match with_timeout(self.timeout, source.reply()).await {
            Ok(result) => result,
            Err(_) => {
                warn!("no reply within {} ms", self.timeout.as_millis());
                Err(Error::ReplyTimeout)
            }
        }
    }
}

/// [`ColdPoll`] or [`WarmWait`], chosen at runtime.
pub enum ReplyMode<D> {
    /// Interrupts are not serviced yet.
    Poll(ColdPoll<D>),
    /// The executor is running.
    Block(WarmWait),
}

impl<D: DelayNs> ReplyMode<D> {
    /// Block if the caller may suspend, poll otherwise.
    pub fn select(sleep_available: bool, delay: D) -> Self {
        if sleep_available {
            Self::Block(WarmWait::new())
        } else {
            Self::Poll(ColdPoll::new(delay))
        }
    }
}

impl<D: DelayNs> ReplyWait for ReplyMode<D> {
    async fn wait<R: ReplySource>(&mut self, source: &R) -> Result<(), Error> {
        match self {
            Self::Poll(poll) => poll.wait(source).await,
            Self::Block(block) => block.wait(source).await,
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use core::cell::{Cell, RefCell};
    use embassy_futures::block_on;
    use std::vec::Vec;

    #[derive(Default)]
    struct MockDelay {
        calls: Vec<u32>,
    }

    impl DelayNs for MockDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.calls.push(ns);
        }
    }

    /// Replays a fixed sequence of receive outcomes.
    struct Script {
        results: RefCell<Vec<Result<(), Error>>>,
        receives: Cell<usize>,
    }

    impl Script {
        fn new(mut results: Vec<Result<(), Error>>) -> Self {
            results.reverse();
            Self {
                results: RefCell::new(results),
                receives: Cell::new(0),
            }
        }
    }

    impl ReplySource for Script {
        fn receive(&self) -> Result<(), Error> {
            self.receives.set(self.receives.get() + 1);
            self.results
                .borrow_mut()
                .pop()
                .unwrap_or(Err(Error::ChecksumMismatch))
        }

        async fn reply(&self) -> Result<(), Error> {
            self.receive()
        }
    }

    /// A source whose interrupt never fires.
    struct Silent;

    impl ReplySource for Silent {
        fn receive(&self) -> Result<(), Error> {
            Err(Error::ChecksumMismatch)
        }

        fn reply(&self) -> impl Future<Output = Result<(), Error>> {
            core::future::pending()
        }
    }

    #[test]
    fn test_cold_poll_stops_at_first_good_packet() {
        let source = Script::new(std::vec![
            Err(Error::ChecksumMismatch),
            Err(Error::ErrorReply),
            Ok(()),
        ]);
        let mut poll = ColdPoll::new(MockDelay::default());

        assert_eq!(block_on(poll.wait(&source)), Ok(()));
        assert_eq!(source.receives.get(), 3);
        assert_eq!(poll.delay.calls, std::vec![10_000; 3]);
    }

    #[test]
    fn test_cold_poll_bounded() {
        let source = Script::new(Vec::new());
        let mut poll = ColdPoll::new(MockDelay::default());

        assert_eq!(block_on(poll.wait(&source)), Err(Error::ReplyTimeout));
        assert_eq!(source.receives.get(), POLL_ATTEMPTS);
        assert_eq!(poll.delay.calls.len(), POLL_ATTEMPTS);
    }

    #[test]
    fn test_no_reply() {
        let mut wait = NoReply;
        assert!(!NoReply::EXPECTS_REPLY);
        assert_eq!(block_on(wait.wait(&Silent)), Ok(()));
    }

    #[test]
    fn test_warm_wait_passes_through_result() {
        let source = Script::new(std::vec![Err(Error::ErrorReply)]);
        let mut wait = WarmWait::new();
        assert!(WarmWait::EXPECTS_REPLY);

        assert_eq!(block_on(wait.wait(&source)), Err(Error::ErrorReply));
    }

    #[test]
    fn test_warm_wait_times_out() {
        let mut wait = WarmWait::with_timeout(Duration::from_millis(2));
        assert_eq!(block_on(wait.wait(&Silent)), Err(Error::ReplyTimeout));
    }

    #[test]
    fn test_select() {
        assert!(matches!(
            ReplyMode::select(true, MockDelay::default()),
            ReplyMode::Block(_)
        ));
        assert!(matches!(
            ReplyMode::select(false, MockDelay::default()),
            ReplyMode::Poll(_)
        ));

        let mut mode = ReplyMode::select(false, MockDelay::default());
        assert_eq!(block_on(mode.wait(&Silent)), Err(Error::ReplyTimeout));
    }
}
