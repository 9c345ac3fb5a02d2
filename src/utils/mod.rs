//! Utilities shared by the session manager

pub mod signal;
