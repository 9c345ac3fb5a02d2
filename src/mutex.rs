//! Mutex for session data shared with the multiplexer's signal handler
//!
//! Access requires proof of masked interrupts provided by a
//! [`CriticalSection`](crate::crit_sect::CriticalSection) token.

use crate::crit_sect::CriticalSection;
use core::cell::{Ref, RefCell};

/// Wraps a variable which is accessible from the signal handler
pub struct Mutex<T>(RefCell<T>);

impl<T> Mutex<T> {
    /// Creates new wrapper for a variable accessible from an IRQ
    ///
    /// # Example
    ///
    /// ```
    /// use nrf_timeslot::mutex::Mutex;
    ///
    /// static SAFETY_MARGIN_US: Mutex<u32> = Mutex::new(0);
    /// ```
    pub const fn new(value: T) -> Mutex<T> {
        Self(RefCell::new(value))
    }

    /// Borrows the wrapped variable with mutually exclusive access
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn main() {
    /// use nrf_timeslot::crit_sect;
    /// use nrf_timeslot::mutex::Mutex;
    ///
    /// static SAFETY_MARGIN_US: Mutex<u32> = Mutex::new(50);
    ///
    /// crit_sect::locked(|cs| {
    ///   assert_eq!(*SAFETY_MARGIN_US.borrow(cs), 50);
    /// });
    /// # }
    /// ```
    pub fn borrow<'cs>(&'cs self, _cs: &'cs CriticalSection) -> Ref<'cs, T> {
        self.0.borrow()
    }

    /// Replaces the wrapped value, returning the previous one
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn main() {
    /// use nrf_timeslot::crit_sect;
    /// use nrf_timeslot::mutex::Mutex;
    ///
    /// static SESSION_ID: Mutex<Option<u8>> = Mutex::new(None);
    ///
    /// crit_sect::locked(|cs| {
    ///   let prev = SESSION_ID.replace(cs, Some(3));
    ///   assert!(prev.is_none());
    /// });
    /// # }
    /// ```
    pub fn replace(&self, _cs: &CriticalSection, value: T) -> T {
        self.0.replace(value)
    }
}

impl<T: Copy> Mutex<T> {
    /// Copies the wrapped value out of the mutex
    pub fn get(&self, cs: &CriticalSection) -> T {
        *self.borrow(cs)
    }
}

// Safety: Mutex is Sync assuming the contained type is Send and the crit_sect module prevents
// concurrent access from the signal handler and thread contexts. This assumption is verified
// run-time by the RefCell used inside the mutex.
unsafe impl<T> Sync for Mutex<T> where T: Send {}
