//! Single-slot notification from interrupt context to one waiting thread
//!
//! The signal handler raises a code, the worker waits for it. Raising a code while the previous
//! one was not taken yet overwrites it: the worker sees only the most recent code. Receivers must
//! therefore treat a code as "something happened since the last look" and derive their next step
//! from shared state instead of from the history of codes.
//!
//! # Examples
//!
//! ```
//! use nrf_timeslot::utils::signal::SignalBridge;
//!
//! static BRIDGE: SignalBridge = SignalBridge::new();
//!
//! BRIDGE.raise(1);
//! BRIDGE.raise(3);
//!
//! assert_eq!(BRIDGE.take(), Some(3));
//! assert_eq!(BRIDGE.take(), None);
//! ```

use core::sync::atomic::{AtomicU16, Ordering};

const EMPTY: u16 = u16::MAX;

/// Latest-value-wins signal bridging an ISR and a single consumer
pub struct SignalBridge {
    slot: AtomicU16,
}

impl SignalBridge {
    /// Create an empty bridge
    pub const fn new() -> Self {
        Self {
            slot: AtomicU16::new(EMPTY),
        }
    }

    /// Raise `code`, overwriting any code not consumed yet
    ///
    /// Never blocks and can be called from any interrupt priority.
    pub fn raise(&self, code: u8) {
        self.slot.store(code.into(), Ordering::Release);
        notify();
    }

    /// Take the pending code, if any, leaving the bridge empty
    pub fn take(&self) -> Option<u8> {
        match self.slot.swap(EMPTY, Ordering::AcqRel) {
            EMPTY => None,
            code => Some(code as u8),
        }
    }

    /// Block the calling context until a code is raised and take it
    pub fn wait(&self) -> u8 {
        loop {
            if let Some(code) = self.take() {
                return code;
            }
            wait_for_event();
        }
    }
}

impl Default for SignalBridge {
    fn default() -> Self {
        Self::new()
    }
}

// A SEV raised between `take` and `WFE` leaves the event register set, so the WFE returns
// immediately and the code is not missed.
#[cfg(feature = "nrf52840")]
fn notify() {
    cortex_m::asm::sev();
}

#[cfg(feature = "nrf52840")]
fn wait_for_event() {
    cortex_m::asm::wfe();
}

#[cfg(not(feature = "nrf52840"))]
fn notify() {}

#[cfg(not(feature = "nrf52840"))]
fn wait_for_event() {
    core::hint::spin_loop();
}
