//! Interface of the vendor radio multiplexer
//!
//! The multiplexer arbitrates the radio between the vendor radio stack and any number of timeslot
//! sessions. This crate consumes three of its services: opening a session, requesting a
//! timeslot, and receiving asynchronous signals through a synchronous callback. The integration
//! implements [`Multiplexer`] on top of the vendor driver and forwards every signal of the opened
//! session to the registered [`SignalHandler`].

use crate::error::Error;
use crate::timeslot::request::Request;

#[cfg(test)]
use mockall::*;

/// Identifier of a session opened in the multiplexer
pub type SessionId = u8;

/// Shortest timeslot the multiplexer grants
pub const TIMESLOT_LENGTH_MIN_US: u32 = 100;
/// Longest timeslot the multiplexer grants
pub const TIMESLOT_LENGTH_MAX_US: u32 = 100_000;
/// Longest distance between the starts of two consecutive timeslots
pub const TIMESLOT_DISTANCE_MAX_US: u32 = 128_000_000 - 1;
/// Longest acquisition timeout of an earliest request
pub const EARLIEST_TIMEOUT_MAX_US: u32 = 128_000_000 - 1;

/// Signals delivered by the multiplexer from its highest priority interrupt
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Signal {
    /// A timeslot started
    Start,
    /// The TIMER0 interrupt fired during a timeslot
    Timer0,
    /// The RADIO interrupt fired during a timeslot
    Radio,
    /// A timeslot extension was denied
    ExtendFailed,
    /// A timeslot extension was granted
    ExtendSucceeded,
    /// The requested timeslot could not be scheduled
    Blocked,
    /// The scheduled timeslot was revoked by higher priority radio activity
    Cancelled,
    /// The session has no timeslot requested or running
    SessionIdle,
    /// The signal handler returned an action the multiplexer could not execute
    InvalidReturn,
    /// The session was closed
    SessionClosed,
    /// The timeslot was not ended before its length elapsed
    Overstayed,
    /// Signal number not known to this crate
    Unknown(u32),
}

impl From<u32> for Signal {
    fn from(raw: u32) -> Self {
        match raw {
            0 => Signal::Start,
            1 => Signal::Timer0,
            2 => Signal::Radio,
            3 => Signal::ExtendFailed,
            4 => Signal::ExtendSucceeded,
            5 => Signal::Blocked,
            6 => Signal::Cancelled,
            7 => Signal::SessionIdle,
            8 => Signal::InvalidReturn,
            9 => Signal::SessionClosed,
            10 => Signal::Overstayed,
            other => Signal::Unknown(other),
        }
    }
}

/// Decision returned synchronously to the multiplexer for every signal
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Continue the current timeslot (or do nothing outside of a timeslot)
    None,
    /// End the current timeslot immediately
    End,
    /// End the current timeslot and request the next one
    Request(Request),
}

/// Receiver of the multiplexer's signals
///
/// Called from the multiplexer's highest priority interrupt. Implementations must return within
/// microseconds and must never block.
pub trait SignalHandler: Sync {
    /// Handle `signal` and decide what the multiplexer does next
    fn on_signal(&self, signal: Signal) -> Action;
}

/// Services consumed from the vendor radio multiplexer
#[cfg_attr(test, automock)]
pub trait Multiplexer: Sync {
    /// Open a timeslot session
    ///
    /// Every signal of the opened session must be passed to `handler` for the rest of the
    /// program's life.
    fn open_session(&self, handler: &'static dyn SignalHandler) -> Result<SessionId, Error>;

    /// Request a timeslot outside of the signal handler
    ///
    /// Errors are the multiplexer's rejection of the request parameters or state.
    fn request(&self, session: SessionId, request: &Request) -> Result<(), Error>;
}
