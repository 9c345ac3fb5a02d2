//! Portable hardware deadline abstraction
//!
//! At the start of each timeslot a one-shot deadline is armed shortly before the slot ends. When
//! it fires the multiplexer delivers the [`Timer0`](crate::multiplexer::Signal::Timer0) signal,
//! which is the moment the next timeslot is requested. The deadline must be hardware based, because
//! detecting the end of a slot has to be independent of the multiplexer's signal latency.

pub mod timer0_deadline;

#[cfg(test)]
use mockall::*;

/// One-shot deadline armed relative to the start of the current timeslot
///
/// Implementations are called from the multiplexer's signal handler, so they must not block.
#[cfg_attr(test, automock)]
pub trait DeadlineTimer: Sync {
    /// Fire the deadline `offset_us` microseconds after the timeslot started
    ///
    /// Arming also enables the interrupt line associated with the deadline.
    fn arm(&self, offset_us: u32);

    /// Acknowledge a fired deadline
    ///
    /// Clears the event and disables the deadline interrupt, so it does not fire again until it
    /// is armed in the next timeslot.
    fn acknowledge(&self);
}
