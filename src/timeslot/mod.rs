//! Timeslot session manager
//!
//! A [`Session`] obtains periodically recurring timeslots of exclusive radio access from the
//! vendor radio multiplexer. It runs in two execution contexts:
//!
//! * the multiplexer's signal handler, running in the highest priority interrupt, which answers
//!   the multiplexer immediately (continue, end the slot, or request the next one) and forwards
//!   everything else through a single-slot signal
//! * a dedicated worker thread running [`Session::run`], which calls the application's
//!   [`Callbacks`] and issues the requests which need not be answered from the interrupt
//!
//! Data flow: multiplexer -> signal handler -> {action returned to the multiplexer} and/or
//! {signal raised} -> worker -> {callbacks, follow-up requests}.
//!
//! # Examples
//!
//! ```no_run
//! use nrf52840_hal::pac::Peripherals;
//! use nrf_timeslot::error::Error;
//! use nrf_timeslot::hw::timer::timer0_deadline::Timer0Deadline;
//! use nrf_timeslot::multiplexer::{Multiplexer, SessionId, SignalHandler};
//! use nrf_timeslot::timeslot::request::{HfclkSource, Request};
//! use nrf_timeslot::timeslot::{Callbacks, Session, SessionConfig};
//!
//! // Integration with the vendor multiplexer driver
//! struct Mpsl;
//! impl Multiplexer for Mpsl {
//!     fn open_session(&self, handler: &'static dyn SignalHandler) -> Result<SessionId, Error> {
//!         // Store `handler` for the driver's signal trampoline and open the session
//!         Ok(0)
//!     }
//!     fn request(&self, session: SessionId, request: &Request) -> Result<(), Error> {
//!         Ok(())
//!     }
//! }
//!
//! static CALLBACKS: Callbacks = Callbacks {
//!     start: || { /* The radio is ours */ },
//!     end: || { /* Finish radio activity */ },
//!     error: |_reason: Error| {},
//!     skipped: |_count: u8| {},
//!     stopped: || {},
//!     radio_irq: Some(|| { /* Handle RADIO events */ }),
//! };
//!
//! static mut SESSION: Option<Session<Mpsl, Timer0Deadline>> = None;
//!
//! fn main() {
//!     let peripherals = Peripherals::take().unwrap();
//!     let config = SessionConfig::new(HfclkSource::XtalGuaranteed, 1_000_000, 100, 3);
//!
//!     // Safety: at this point no other module has access to static variables
//!     let session = unsafe {
//!         SESSION.replace(Session::new(Mpsl, Timer0Deadline::new(&peripherals.TIMER0)));
//!         SESSION.as_ref().unwrap()
//!     };
//!
//!     session.open(config, &CALLBACKS).unwrap();
//!     session.start(1_000, 10_000).unwrap();
//!
//!     // Usually run in a dedicated thread
//!     session.run();
//! }
//! ```

mod isr;
pub mod request;
mod state;
mod worker;

#[cfg(test)]
mod test_fixtures;

pub use state::Status;

use crate::crit_sect;
use crate::error::Error;
use crate::hw::timer::DeadlineTimer;
use crate::multiplexer::{
    Multiplexer, EARLIEST_TIMEOUT_MAX_US, TIMESLOT_DISTANCE_MAX_US, TIMESLOT_LENGTH_MAX_US,
    TIMESLOT_LENGTH_MIN_US,
};
use crate::mutex::Mutex;
use crate::utils::signal::SignalBridge;
use request::{HfclkSource, RequestPolicy};
use state::SessionState;

/// Signature of the callback called when a timeslot starts
pub type StartCallback = fn();
/// Signature of the callback called when the current timeslot is about to end
pub type EndCallback = fn();
/// Signature of the callback reporting asynchronous errors
pub type ErrorCallback = fn(Error);
/// Signature of the callback reporting the number of consecutive skipped timeslots
pub type SkippedCallback = fn(u8);
/// Signature of the callback called when a requested stop is completed
pub type StoppedCallback = fn();
/// Signature of a radio interrupt handler
pub type RadioIrqCallback = fn();

/// Callbacks notifying the application about the timeslot sequence
///
/// All callbacks are called from the worker context, never from an interrupt.
#[derive(Debug, Clone, Copy)]
pub struct Callbacks {
    /// A timeslot started, the radio can be used until `end` is called
    pub start: StartCallback,
    /// The timeslot is about to end, all radio activity must be finished now
    pub end: EndCallback,
    /// The sequence failed
    pub error: ErrorCallback,
    /// A timeslot was denied or cancelled and a retry was requested
    pub skipped: SkippedCallback,
    /// The sequence stopped after [`Session::stop`]
    pub stopped: StoppedCallback,
    /// The RADIO interrupt fired during a timeslot
    ///
    /// Mandatory with [`RadioIrqDispatch::Deferred`], unused otherwise.
    pub radio_irq: Option<RadioIrqCallback>,
}

/// Way the RADIO interrupt is handled during a timeslot
#[derive(Debug, Clone, Copy)]
pub enum RadioIrqDispatch {
    /// Forward to [`Callbacks::radio_irq`] in the worker context
    Deferred,
    /// Call the integration's radio interrupt handler directly from the interrupt context
    Direct(RadioIrqCallback),
}

/// Largest accepted [`SessionConfig::skipped_tolerance`]
///
/// The denial counter saturates at `u8::MAX`, so a larger tolerance could never be exceeded.
pub const SKIPPED_TOLERANCE_MAX: u8 = u8::MAX - 1;

/// Session parameters supplied once in [`Session::open`]
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Clock guarantee required during timeslots
    pub hfclk: HfclkSource,
    /// Time to wait for a timeslot before the sequence is anchored
    pub timeout_us: u32,
    /// Time reserved before the end of a timeslot in which the next timeslot is requested
    pub safety_margin_us: u32,
    /// Maximum consecutive denied or cancelled timeslots before the sequence fails
    ///
    /// At most [`SKIPPED_TOLERANCE_MAX`].
    pub skipped_tolerance: u8,
    /// RADIO interrupt handling
    pub radio_irq: RadioIrqDispatch,
}

impl SessionConfig {
    /// Create a configuration deferring RADIO interrupts to the worker
    pub const fn new(
        hfclk: HfclkSource,
        timeout_us: u32,
        safety_margin_us: u32,
        skipped_tolerance: u8,
    ) -> Self {
        Self {
            hfclk,
            timeout_us,
            safety_margin_us,
            skipped_tolerance,
            radio_irq: RadioIrqDispatch::Deferred,
        }
    }

    /// Call `handler` directly from the interrupt context on RADIO interrupts
    pub const fn with_direct_radio_irq(mut self, handler: RadioIrqCallback) -> Self {
        self.radio_irq = RadioIrqDispatch::Direct(handler);
        self
    }

    fn validate(&self, callbacks: &Callbacks) -> Result<(), Error> {
        if self.timeout_us == 0 || self.timeout_us > EARLIEST_TIMEOUT_MAX_US {
            return Err(Error::InvalidParam);
        }
        if self.skipped_tolerance > SKIPPED_TOLERANCE_MAX {
            return Err(Error::InvalidParam);
        }
        if matches!(self.radio_irq, RadioIrqDispatch::Deferred) && callbacks.radio_irq.is_none() {
            return Err(Error::InvalidParam);
        }
        Ok(())
    }
}

/// Configuration captured when the session was opened
#[derive(Clone, Copy)]
struct Registration {
    config: SessionConfig,
    callbacks: &'static Callbacks,
}

/// Timeslot session bound to one radio multiplexer and one hardware deadline
///
/// A single instance exists per radio peripheral. It is shared by reference between the
/// lifecycle API, the multiplexer's signal handler and the worker.
pub struct Session<M, D> {
    multiplexer: M,
    deadline: D,
    state: SessionState,
    registration: Mutex<Option<Registration>>,
    signal: SignalBridge,
}

impl<M, D> Session<M, D>
where
    M: Multiplexer + 'static,
    D: DeadlineTimer + 'static,
{
    /// Create a closed session using passed collaborators
    pub const fn new(multiplexer: M, deadline: D) -> Self {
        Self {
            multiplexer,
            deadline,
            state: SessionState::new(),
            registration: Mutex::new(None),
            signal: SignalBridge::new(),
        }
    }

    /// Open the session in the multiplexer
    ///
    /// Registers this session as the handler of the multiplexer's signals. `callbacks` are
    /// borrowed for the rest of the program.
    ///
    /// Returns:
    /// * [`Ok(())`](core::result::Result::Ok) if the session is opened
    /// * [`Err(Error::SessionAlreadyOpen)`](Error::SessionAlreadyOpen) if it was opened before
    /// * [`Err(Error::InvalidParam)`](Error::InvalidParam) if `config` is out of range or the
    ///   `radio_irq` callback is missing in the deferred dispatch mode
    /// * any error reported by the multiplexer when opening the session
    pub fn open(&'static self, config: SessionConfig, callbacks: &'static Callbacks) -> Result<(), Error> {
        if self.state.session_open() {
            return Err(Error::SessionAlreadyOpen);
        }
        config.validate(callbacks)?;

        info!("timeslot open");
        crit_sect::locked(|cs| {
            self.registration
                .replace(cs, Some(Registration { config, callbacks }))
        });

        match self.multiplexer.open_session(self) {
            Ok(session_id) => {
                self.state.mark_open(session_id);
                Ok(())
            }
            Err(e) => {
                crit_sect::locked(|cs| self.registration.replace(cs, None));
                Err(e)
            }
        }
    }

    /// Start requesting timeslots of `len_us` every `interval_us`
    ///
    /// The first timeslot is requested as soon as possible. Following ones are requested
    /// `interval_us` after the start of the previous one.
    ///
    /// Returns:
    /// * [`Ok(())`](core::result::Result::Ok) if the first timeslot was requested
    /// * [`Err(Error::AlreadyStarted)`](Error::AlreadyStarted) if the session is not open, or a
    ///   sequence is running or stopping
    /// * [`Err(Error::InvalidParam)`](Error::InvalidParam) if `len_us` is out of the range
    ///   accepted by the multiplexer or does not exceed the safety margin, or `interval_us` is 0
    ///   or too long
    /// * any error reported by the multiplexer for the request, in which case the session stays
    ///   not started
    pub fn start(&self, len_us: u32, interval_us: u32) -> Result<(), Error> {
        if !self.state.session_open() || self.state.started() || self.state.stopping() {
            return Err(Error::AlreadyStarted);
        }
        let registration = self.registration().ok_or(Error::AlreadyStarted)?;

        if !(TIMESLOT_LENGTH_MIN_US..=TIMESLOT_LENGTH_MAX_US).contains(&len_us)
            || len_us <= registration.config.safety_margin_us
            || interval_us == 0
            || interval_us > TIMESLOT_DISTANCE_MAX_US
        {
            return Err(Error::InvalidParam);
        }

        if !self.state.begin(len_us, interval_us) {
            return Err(Error::AlreadyStarted);
        }
        info!("timeslot start, len: {} us, interval: {} us", len_us, interval_us);

        let request = self.policy(&registration).earliest();
        self.multiplexer
            .request(self.state.session_id(), &request)
            .map_err(|e| {
                self.state.finalize();
                e
            })
    }

    /// Request the running sequence to stop
    ///
    /// The sequence stops at the next timeslot boundary or when the multiplexer reports the
    /// session idle. Completion is reported by the `stopped` callback.
    ///
    /// Returns [`Err(Error::NoTimeslotStarted)`](Error::NoTimeslotStarted) if no sequence is
    /// running or it is already stopping.
    pub fn stop(&self) -> Result<(), Error> {
        if !self.state.session_open() || !self.state.request_stop() {
            return Err(Error::NoTimeslotStarted);
        }
        info!("timeslot stop");
        Ok(())
    }

    /// Get a snapshot of the session state
    pub fn status(&self) -> Status {
        self.state.status()
    }

    fn registration(&self) -> Option<Registration> {
        crit_sect::locked(|cs| self.registration.get(cs))
    }

    fn policy(&self, registration: &Registration) -> RequestPolicy {
        RequestPolicy {
            hfclk: registration.config.hfclk,
            timeout_us: registration.config.timeout_us,
            length_us: self.state.ts_len_us(),
            interval_us: self.state.conn_interval_us(),
        }
    }
}
