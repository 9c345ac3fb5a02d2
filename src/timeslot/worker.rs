//! Worker side of the session manager
//!
//! The worker waits for the signal raised by the signal handler and, for each one, calls the
//! application's callbacks and issues requests which need not be answered from the interrupt.
//! Signals are coalesced, so the worker derives its next step from the session state, never from
//! the sequence of signals it observed.

use super::{Callbacks, Registration, Session};
use crate::error::Error;
use crate::hw::timer::DeadlineTimer;
use crate::multiplexer::Multiplexer;

/// Codes passed from the signal handler to the worker
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub(crate) enum SignalCode {
    Start = 0x00,
    Timer0 = 0x01,
    Radio = 0x02,
    BlockedCancelled = 0x03,
    Overstayed = 0x04,
    Idle = 0x05,
    Unexpected = 0x06,
}

impl TryFrom<u8> for SignalCode {
    type Error = u8;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0x00 => Ok(SignalCode::Start),
            0x01 => Ok(SignalCode::Timer0),
            0x02 => Ok(SignalCode::Radio),
            0x03 => Ok(SignalCode::BlockedCancelled),
            0x04 => Ok(SignalCode::Overstayed),
            0x05 => Ok(SignalCode::Idle),
            0x06 => Ok(SignalCode::Unexpected),
            other => Err(other),
        }
    }
}

impl<M, D> Session<M, D>
where
    M: Multiplexer + 'static,
    D: DeadlineTimer + 'static,
{
    /// Run the worker forever
    ///
    /// Must be called from exactly one long-lived thread. Each iteration blocks until the signal
    /// handler raises a signal and then handles it.
    pub fn run(&self) -> ! {
        loop {
            self.run_once();
        }
    }

    /// Block until a signal is raised and handle it
    pub fn run_once(&self) {
        let code = self.signal.wait();
        self.handle_signal(code);
    }

    /// Handle the pending signal, if any, without blocking
    ///
    /// Returns `true` if a signal was handled.
    pub fn poll(&self) -> bool {
        match self.signal.take() {
            Some(code) => {
                self.handle_signal(code);
                true
            }
            None => false,
        }
    }

    fn handle_signal(&self, raw: u8) {
        let Some(registration) = self.registration() else {
            warn!("timeslot signal before open");
            return;
        };
        let callbacks = registration.callbacks;

        match SignalCode::try_from(raw) {
            Ok(SignalCode::Start) => {
                (callbacks.start)();
                self.state.anchor();
            }

            Ok(SignalCode::Timer0) => (callbacks.end)(),

            Ok(SignalCode::Radio) => {
                if let Some(radio_irq) = callbacks.radio_irq {
                    radio_irq();
                }
            }

            Ok(SignalCode::BlockedCancelled) => self.handle_blocked_cancelled(&registration),

            Ok(SignalCode::Idle) => {
                if self.state.stopping() {
                    self.finalize_stop(callbacks);
                } else if self.state.started() {
                    // The session went idle although nothing asked it to stop. No further signal
                    // arrives for this sequence, so it is reset here.
                    self.state.finalize();
                    report_error(callbacks, Error::Internal);
                } else {
                    debug!("timeslot idle");
                }
            }

            Ok(SignalCode::Overstayed) => report_error(callbacks, Error::Overstayed),

            Ok(SignalCode::Unexpected) | Err(_) => report_error(callbacks, Error::Internal),
        }
    }

    fn handle_blocked_cancelled(&self, registration: &Registration) {
        let callbacks = registration.callbacks;

        if !self.state.started() {
            debug!("timeslot denial without a running sequence");
            return;
        }

        let count = self.state.record_denial();
        let anchored = self.state.anchored();

        if count > registration.config.skipped_tolerance {
            self.state.finalize();
            report_error(
                callbacks,
                if anchored {
                    Error::Cancelled
                } else {
                    Error::AnchorFailed
                },
            );
            return;
        }

        if self.state.stopping() {
            self.finalize_stop(callbacks);
            return;
        }

        debug!("timeslot skipped: {}", count);
        let request = self.policy(registration).retry(anchored, count);
        if let Err(e) = self.multiplexer.request(self.state.session_id(), &request) {
            self.state.finalize();
            report_error(callbacks, e);
        }
        (callbacks.skipped)(count);
    }

    fn finalize_stop(&self, callbacks: &Callbacks) {
        self.state.finalize();
        info!("timeslot stopped");
        (callbacks.stopped)();
    }
}

fn report_error(callbacks: &Callbacks, reason: Error) {
    warn!("timeslot error: {}", reason);
    (callbacks.error)(reason);
}

#[cfg(test)]
mod tests {
    use super::super::test_fixtures::*;
    use super::*;
    use crate::multiplexer::{Action, MockMultiplexer, Signal, SignalHandler};
    use crate::timeslot::request::{HfclkSource, Priority, Request};
    use mockall::predicate::*;
    use mockall::Sequence;
    use serial_test::serial;

    fn earliest() -> Request {
        Request::Earliest {
            hfclk: HfclkSource::XtalGuaranteed,
            priority: Priority::Normal,
            length_us: LEN_US,
            timeout_us: TIMEOUT_US,
        }
    }

    fn retry(distance_us: u32) -> Request {
        Request::Normal {
            hfclk: HfclkSource::XtalGuaranteed,
            priority: Priority::High,
            distance_us,
            length_us: LEN_US,
        }
    }

    /// Multiplexer expecting `requests` in order
    fn multiplexer_expecting(requests: &[Request]) -> MockMultiplexer {
        let mut mux = opened_multiplexer();
        let mut seq = Sequence::new();
        for request in requests {
            mux.expect_request()
                .with(eq(SESSION_ID), eq(*request))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _| Ok(()));
        }
        mux
    }

    /// Deliver `signal` as the multiplexer would and let the worker handle it
    fn deliver(session: &TestSession, signal: Signal) -> Action {
        let action = session.on_signal(signal);
        session.poll();
        action
    }

    #[test]
    fn test_signal_code_conversion() {
        assert_eq!(SignalCode::try_from(0x03), Ok(SignalCode::BlockedCancelled));
        assert_eq!(SignalCode::try_from(0x06), Ok(SignalCode::Unexpected));
        assert_eq!(SignalCode::try_from(0x07), Err(0x07));
    }

    #[test]
    #[serial]
    fn test_slot_start_anchors_sequence() {
        clear_events();
        let guard = open_session(multiplexer_expecting(&[earliest()]), deadline(), config(3));
        let session = guard.session();
        assert_eq!(session.start(LEN_US, INTERVAL_US), Ok(()));

        assert_eq!(deliver(session, Signal::Start), Action::None);

        assert_eq!(take_events(), vec![Event::Start]);
        let status = session.status();
        assert!(status.anchored);
        assert!(status.started);
        assert_eq!(status.blocked_cancelled_count, 0);
    }

    #[test]
    #[serial]
    fn test_deadline_notifies_end_of_slot() {
        clear_events();
        let guard = open_session(multiplexer_expecting(&[earliest()]), deadline(), config(3));
        let session = guard.session();
        assert_eq!(session.start(LEN_US, INTERVAL_US), Ok(()));
        deliver(session, Signal::Start);

        deliver(session, Signal::Timer0);

        assert_eq!(take_events(), vec![Event::Start, Event::End]);
    }

    #[test]
    #[serial]
    fn test_radio_callback_is_called_from_worker() {
        clear_events();
        let guard = open_session(multiplexer_expecting(&[earliest()]), deadline(), config(3));
        let session = guard.session();
        assert_eq!(session.start(LEN_US, INTERVAL_US), Ok(()));

        session.on_signal(Signal::Radio);
        assert_eq!(take_events(), vec![]);
        assert!(session.poll());

        assert_eq!(take_events(), vec![Event::RadioIrq]);
    }

    #[test]
    #[serial]
    fn test_anchored_retries_back_off() {
        clear_events();
        let mux =
            multiplexer_expecting(&[earliest(), retry(2 * INTERVAL_US), retry(3 * INTERVAL_US)]);
        let guard = open_session(mux, deadline(), config(3));
        let session = guard.session();
        assert_eq!(session.start(LEN_US, INTERVAL_US), Ok(()));
        deliver(session, Signal::Start);

        deliver(session, Signal::Blocked);
        deliver(session, Signal::Blocked);

        assert_eq!(
            take_events(),
            vec![Event::Start, Event::Skipped(1), Event::Skipped(2)]
        );
        assert_eq!(session.status().blocked_cancelled_count, 2);
        assert!(session.status().started);
    }

    #[test]
    #[serial]
    fn test_anchored_sequence_fails_after_tolerance() {
        clear_events();
        let mux = multiplexer_expecting(&[
            earliest(),
            retry(2 * INTERVAL_US),
            retry(3 * INTERVAL_US),
            retry(4 * INTERVAL_US),
        ]);
        let guard = open_session(mux, deadline(), config(3));
        let session = guard.session();
        assert_eq!(session.start(LEN_US, INTERVAL_US), Ok(()));
        deliver(session, Signal::Start);

        for _ in 0..4 {
            deliver(session, Signal::Cancelled);
        }

        assert_eq!(
            take_events(),
            vec![
                Event::Start,
                Event::Skipped(1),
                Event::Skipped(2),
                Event::Skipped(3),
                Event::Error(Error::Cancelled),
            ]
        );
        assert!(!session.status().started);
        assert!(!session.status().anchored);
    }

    #[test]
    #[serial]
    fn test_unanchored_sequence_retries_earliest_then_fails() {
        clear_events();
        let mux = multiplexer_expecting(&[earliest(), earliest(), earliest()]);
        let guard = open_session(mux, deadline(), config(2));
        let session = guard.session();
        assert_eq!(session.start(LEN_US, INTERVAL_US), Ok(()));

        for _ in 0..3 {
            deliver(session, Signal::Blocked);
        }

        assert_eq!(
            take_events(),
            vec![
                Event::Skipped(1),
                Event::Skipped(2),
                Event::Error(Error::AnchorFailed),
            ]
        );
    }

    #[test]
    #[serial]
    fn test_failed_sequence_can_be_started_again() {
        clear_events();
        let guard = open_session(
            multiplexer_expecting(&[earliest(), earliest()]),
            deadline(),
            config(0),
        );
        let session = guard.session();
        assert_eq!(session.start(LEN_US, INTERVAL_US), Ok(()));
        deliver(session, Signal::Blocked);
        deliver(session, Signal::SessionIdle);

        assert_eq!(take_events(), vec![Event::Error(Error::AnchorFailed)]);
        assert_eq!(session.start(LEN_US, INTERVAL_US), Ok(()));
        assert_eq!(session.status().blocked_cancelled_count, 0);
    }

    #[test]
    #[serial]
    fn test_rejected_retry_reports_error_and_skip() {
        clear_events();
        let mut mux = opened_multiplexer();
        let mut seq = Sequence::new();
        mux.expect_request()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        mux.expect_request()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(Error::Multiplexer(-22)));
        let guard = open_session(mux, deadline(), config(3));
        let session = guard.session();
        assert_eq!(session.start(LEN_US, INTERVAL_US), Ok(()));

        deliver(session, Signal::Blocked);

        assert_eq!(
            take_events(),
            vec![Event::Error(Error::Multiplexer(-22)), Event::Skipped(1)]
        );
        assert!(!session.status().started);
        assert!(!session.status().stopping);
    }

    #[test]
    #[serial]
    fn test_stop_completes_on_idle() {
        clear_events();
        let guard = open_session(
            multiplexer_expecting(&[earliest(), earliest()]),
            deadline(),
            config(3),
        );
        let session = guard.session();
        assert_eq!(session.start(LEN_US, INTERVAL_US), Ok(()));
        deliver(session, Signal::Start);
        assert_eq!(session.stop(), Ok(()));

        assert_eq!(deliver(session, Signal::Timer0), Action::End);
        assert_eq!(deliver(session, Signal::SessionIdle), Action::None);

        assert_eq!(
            take_events(),
            vec![Event::Start, Event::End, Event::Stopped]
        );
        let status = session.status();
        assert!(status.session_open);
        assert!(!status.started);
        assert!(!status.stopping);
        assert!(!status.anchored);
        assert_eq!(session.start(LEN_US, INTERVAL_US), Ok(()));
    }

    #[test]
    #[serial]
    fn test_stop_completes_on_denial() {
        clear_events();
        let guard = open_session(multiplexer_expecting(&[earliest()]), deadline(), config(3));
        let session = guard.session();
        assert_eq!(session.start(LEN_US, INTERVAL_US), Ok(()));
        assert_eq!(session.stop(), Ok(()));

        deliver(session, Signal::Cancelled);

        assert_eq!(take_events(), vec![Event::Stopped]);
        assert!(!session.status().started);
    }

    #[test]
    #[serial]
    fn test_stop_completes_once() {
        clear_events();
        let guard = open_session(multiplexer_expecting(&[earliest()]), deadline(), config(3));
        let session = guard.session();
        assert_eq!(session.start(LEN_US, INTERVAL_US), Ok(()));
        deliver(session, Signal::Start);
        assert_eq!(session.stop(), Ok(()));

        deliver(session, Signal::Timer0);
        deliver(session, Signal::SessionIdle);
        deliver(session, Signal::SessionIdle);

        let stopped = take_events()
            .into_iter()
            .filter(|e| *e == Event::Stopped)
            .count();
        assert_eq!(stopped, 1);
    }

    #[test]
    #[serial]
    fn test_unexpected_idle_reports_internal_error() {
        clear_events();
        let guard = open_session(multiplexer_expecting(&[earliest()]), deadline(), config(3));
        let session = guard.session();
        assert_eq!(session.start(LEN_US, INTERVAL_US), Ok(()));

        deliver(session, Signal::SessionIdle);

        assert_eq!(take_events(), vec![Event::Error(Error::Internal)]);
    }

    #[test]
    #[serial]
    fn test_unexpected_idle_resets_sequence() {
        clear_events();
        let guard = open_session(
            multiplexer_expecting(&[earliest(), earliest()]),
            deadline(),
            config(3),
        );
        let session = guard.session();
        assert_eq!(session.start(LEN_US, INTERVAL_US), Ok(()));
        deliver(session, Signal::Start);

        deliver(session, Signal::SessionIdle);

        assert_eq!(
            take_events(),
            vec![Event::Start, Event::Error(Error::Internal)]
        );
        let status = session.status();
        assert!(status.session_open);
        assert!(!status.started);
        assert!(!status.stopping);
        assert!(!status.anchored);
        assert_eq!(session.stop(), Err(Error::NoTimeslotStarted));
        assert_eq!(session.start(LEN_US, INTERVAL_US), Ok(()));
    }

    #[test]
    #[serial]
    fn test_idle_without_sequence_is_ignored() {
        clear_events();
        let guard = open_session(opened_multiplexer(), deadline(), config(3));
        let session = guard.session();

        deliver(session, Signal::SessionIdle);

        assert_eq!(take_events(), vec![]);
    }

    #[test]
    #[serial]
    fn test_overstayed_reports_error() {
        clear_events();
        let guard = open_session(multiplexer_expecting(&[earliest()]), deadline(), config(3));
        let session = guard.session();
        assert_eq!(session.start(LEN_US, INTERVAL_US), Ok(()));

        deliver(session, Signal::Overstayed);

        assert_eq!(take_events(), vec![Event::Error(Error::Overstayed)]);
    }

    #[test]
    #[serial]
    fn test_protocol_violations_report_internal_error() {
        clear_events();
        let guard = open_session(opened_multiplexer(), deadline(), config(3));
        let session = guard.session();

        deliver(session, Signal::InvalidReturn);
        session.signal.raise(0x42);
        assert!(session.poll());

        assert_eq!(
            take_events(),
            vec![Event::Error(Error::Internal), Event::Error(Error::Internal)]
        );
    }

    #[test]
    #[serial]
    fn test_poll_without_signal() {
        clear_events();
        let guard = open_session(opened_multiplexer(), deadline(), config(3));

        assert!(!guard.session().poll());
        assert_eq!(take_events(), vec![]);
    }

    #[test]
    #[serial]
    fn test_run_once_handles_raised_signal() {
        clear_events();
        let guard = open_session(multiplexer_expecting(&[earliest()]), deadline(), config(3));
        let session = guard.session();
        assert_eq!(session.start(LEN_US, INTERVAL_US), Ok(()));

        session.on_signal(Signal::Start);
        session.run_once();

        assert_eq!(take_events(), vec![Event::Start]);
        assert!(session.status().anchored);
    }
}
