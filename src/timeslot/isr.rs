//! The multiplexer's signal handler
//!
//! Runs in the multiplexer's highest priority interrupt. It answers the questions the multiplexer
//! needs answered right away from the session state, and defers everything with application
//! visible consequences to the worker through the signal bridge. It never blocks, never
//! allocates and never calls the application's callbacks.

use super::worker::SignalCode;
use super::{RadioIrqDispatch, Session};
use crate::hw::timer::DeadlineTimer;
use crate::multiplexer::{Action, Multiplexer, Signal, SignalHandler};

impl<M, D> SignalHandler for Session<M, D>
where
    M: Multiplexer + 'static,
    D: DeadlineTimer + 'static,
{
    fn on_signal(&self, signal: Signal) -> Action {
        trace!("timeslot signal");

        match signal {
            Signal::Start => {
                if self.state.stopping() {
                    return Action::End;
                }
                let Some(registration) = self.registration() else {
                    return Action::None;
                };
                self.deadline.arm(
                    self.state
                        .ts_len_us()
                        .saturating_sub(registration.config.safety_margin_us),
                );
                self.raise(SignalCode::Start);
                Action::None
            }

            Signal::Timer0 => {
                self.deadline.acknowledge();
                self.raise(SignalCode::Timer0);
                if self.state.stopping() {
                    return Action::End;
                }
                match self.registration() {
                    Some(registration) => Action::Request(self.policy(&registration).renewal()),
                    None => Action::End,
                }
            }

            Signal::Radio => {
                if self.state.stopping() {
                    return Action::End;
                }
                match self.registration().map(|r| r.config.radio_irq) {
                    Some(RadioIrqDispatch::Direct(radio_irq_handler)) => radio_irq_handler(),
                    Some(RadioIrqDispatch::Deferred) => self.raise(SignalCode::Radio),
                    None => (),
                }
                Action::None
            }

            Signal::Blocked | Signal::Cancelled => {
                self.raise(SignalCode::BlockedCancelled);
                Action::None
            }

            Signal::SessionIdle => {
                self.raise(SignalCode::Idle);
                Action::None
            }

            Signal::Overstayed => {
                self.raise(SignalCode::Overstayed);
                Action::None
            }

            Signal::ExtendFailed
            | Signal::ExtendSucceeded
            | Signal::InvalidReturn
            | Signal::SessionClosed => {
                self.raise(SignalCode::Unexpected);
                Action::None
            }

            Signal::Unknown(_) => Action::None,
        }
    }
}

impl<M, D> Session<M, D> {
    fn raise(&self, code: SignalCode) {
        self.signal.raise(code as u8);
    }
}
