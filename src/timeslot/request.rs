//! Timeslot requests and the policy choosing which one to issue
//!
//! Until the first timeslot of a sequence starts, the session asks for a slot as early as
//! possible. Once anchored, every slot is requested at a distance from the start of the previous
//! one: the steady-state renewal uses the configured interval at normal priority, while retries
//! after a denial back off linearly and escalate to high priority.

use crate::multiplexer::TIMESLOT_DISTANCE_MAX_US;

/// High frequency clock guarantee required during a timeslot
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HfclkSource {
    /// The crystal oscillator runs and is stable for the whole timeslot
    XtalGuaranteed,
    /// The high frequency clock source is not guaranteed
    NoGuarantee,
}

/// Priority of a timeslot request in the multiplexer's arbitration
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Priority {
    /// Default priority
    Normal,
    /// Priority used to win arbitration after a denied timeslot
    High,
}

/// Timeslot request passed to the multiplexer
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    /// Timeslot as soon as possible, within `timeout_us`
    Earliest {
        /// Clock guarantee
        hfclk: HfclkSource,
        /// Arbitration priority
        priority: Priority,
        /// Length of the timeslot
        length_us: u32,
        /// Maximum time to wait for the timeslot
        timeout_us: u32,
    },
    /// Timeslot starting `distance_us` after the start of the previous one
    Normal {
        /// Clock guarantee
        hfclk: HfclkSource,
        /// Arbitration priority
        priority: Priority,
        /// Distance between the starts of the previous and the requested timeslot
        distance_us: u32,
        /// Length of the timeslot
        length_us: u32,
    },
}

/// Parameters of the running timeslot sequence from which requests are built
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct RequestPolicy {
    pub hfclk: HfclkSource,
    pub timeout_us: u32,
    pub length_us: u32,
    pub interval_us: u32,
}

impl RequestPolicy {
    /// Request used before the sequence is anchored
    pub fn earliest(&self) -> Request {
        Request::Earliest {
            hfclk: self.hfclk,
            priority: Priority::Normal,
            length_us: self.length_us,
            timeout_us: self.timeout_us,
        }
    }

    /// Periodic renewal issued at the end of every timeslot
    ///
    /// Independent of any previous denials.
    pub fn renewal(&self) -> Request {
        self.normal(self.interval_us, Priority::Normal)
    }

    /// Request issued after `count` consecutive denied or cancelled timeslots
    pub fn retry(&self, anchored: bool, count: u8) -> Request {
        if anchored {
            let distance_us = self
                .interval_us
                .saturating_mul(u32::from(count) + 1)
                .min(TIMESLOT_DISTANCE_MAX_US);
            self.normal(distance_us, Priority::High)
        } else {
            self.earliest()
        }
    }

    fn normal(&self, distance_us: u32, priority: Priority) -> Request {
        Request::Normal {
            hfclk: self.hfclk,
            priority,
            distance_us,
            length_us: self.length_us,
        }
    }
}
