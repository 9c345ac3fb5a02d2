//! Hardware collaborators of the timeslot session manager
//!
//! Only the hardware deadline is accessed directly. The radio peripheral itself is granted to
//! the application for the duration of a timeslot and is never touched by this crate.

pub mod timer;
