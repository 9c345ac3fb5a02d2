//! Shared fixtures of the session manager's unit tests

use super::request::HfclkSource;
use super::{Callbacks, Session, SessionConfig};
use crate::error::Error;
use crate::hw::timer::MockDeadlineTimer;
use crate::multiplexer::{MockMultiplexer, SessionId};
use std::sync::Mutex as StdMutex;

pub type TestSession = Session<MockMultiplexer, MockDeadlineTimer>;

pub const SESSION_ID: SessionId = 7;
pub const LEN_US: u32 = 1_000;
pub const INTERVAL_US: u32 = 10_000;
pub const TIMEOUT_US: u32 = 1_000_000;
pub const SAFETY_MARGIN_US: u32 = 100;

/// Callback invocation recorded by [`CALLBACKS`]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Event {
    Start,
    End,
    Error(Error),
    Skipped(u8),
    Stopped,
    RadioIrq,
}

// Shared by all tests, so tests checking callbacks must be `#[serial]`
static EVENTS: StdMutex<Vec<Event>> = StdMutex::new(Vec::new());

fn record(event: Event) {
    EVENTS
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .push(event);
}

pub fn clear_events() {
    EVENTS.lock().unwrap_or_else(|e| e.into_inner()).clear();
}

pub fn take_events() -> Vec<Event> {
    core::mem::take(&mut *EVENTS.lock().unwrap_or_else(|e| e.into_inner()))
}

pub const CALLBACKS: Callbacks = Callbacks {
    start: || record(Event::Start),
    end: || record(Event::End),
    error: |reason| record(Event::Error(reason)),
    skipped: |count| record(Event::Skipped(count)),
    stopped: || record(Event::Stopped),
    radio_irq: Some(|| record(Event::RadioIrq)),
};

pub fn config(skipped_tolerance: u8) -> SessionConfig {
    SessionConfig::new(
        HfclkSource::XtalGuaranteed,
        TIMEOUT_US,
        SAFETY_MARGIN_US,
        skipped_tolerance,
    )
}

/// Deadline accepting any number of calls
pub fn deadline() -> MockDeadlineTimer {
    let mut deadline = MockDeadlineTimer::new();
    deadline.expect_arm().return_const(());
    deadline.expect_acknowledge().return_const(());
    deadline
}

/// Multiplexer expecting the session to be opened once
pub fn opened_multiplexer() -> MockMultiplexer {
    let mut mux = MockMultiplexer::new();
    mux.expect_open_session()
        .times(1)
        .returning(|_| Ok(SESSION_ID));
    mux
}

/// Owner of a session which must be `'static` to be registered in the multiplexer
///
/// Dropping the guard drops the session, what verifies the expectations of its mocks.
pub struct SessionGuard {
    session: *mut TestSession,
}

impl SessionGuard {
    pub fn new(mux: MockMultiplexer, deadline: MockDeadlineTimer) -> Self {
        Self {
            session: Box::into_raw(Box::new(Session::new(mux, deadline))),
        }
    }

    pub fn session(&self) -> &'static TestSession {
        // Safety: the returned reference is used only within the test owning this guard
        unsafe { &*self.session }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        // Safety: the pointer comes from `Box::into_raw` and is dropped only once
        drop(unsafe { Box::from_raw(self.session) });
    }
}

/// Session opened with [`CALLBACKS`]
pub fn open_session(
    mux: MockMultiplexer,
    deadline: MockDeadlineTimer,
    config: SessionConfig,
) -> SessionGuard {
    let guard = SessionGuard::new(mux, deadline);
    assert_eq!(guard.session().open(config, &CALLBACKS), Ok(()));
    guard
}
