#![cfg_attr(not(any(test, doctest)), no_std)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

//! Timeslot session manager for Nordic nRF SoCs.
//!
//! Arbitrates the radio between the vendor radio multiplexer and an application which needs
//! periodically recurring windows of exclusive radio access, e.g. to run a custom link layer next
//! to a standard radio stack on the same chip.
//!
//! To use this crate implement [`Multiplexer`](multiplexer::Multiplexer) on top of the vendor
//! driver, create a [`Session`](timeslot::Session) and run its worker in a dedicated thread.

#[cfg(not(any(feature = "mocked_platform", feature = "nrf52840")))]
compile_error!("One platform must be enabled as a build feature");

#[cfg(all(feature = "mocked_platform", feature = "nrf52840"))]
compile_error!("Cannot enable multiple platforms simultaneously (mocked and nrf52840)");

#[cfg(all(test, not(feature = "mocked_platform")))]
compile_error!("For tests \"mocked_platform\" feature shall be selected");

#[macro_use]
mod log;

pub mod crit_sect;
pub mod hw;
pub mod multiplexer;
pub mod mutex;
pub mod utils;

/// Defines errors reported by this crate
pub mod error;

pub mod timeslot;
