//! Critical sections protecting data shared with the multiplexer's signal handler
//!
//! The signal handler runs in the highest priority radio interrupt. Any data it shares with the
//! worker context or the lifecycle API, and which cannot be expressed as a single atomic, is
//! accessed only inside [`locked`].
//!
//! The implementation is provided by the `critical-section` crate: `cortex-m`'s single core
//! implementation on target, and the `std` implementation in host tests.

// TODO: Mask only the multiplexer's interrupt levels instead of relying on cortex_m blocking all
//       IRQs

/// Proof that the current context cannot be preempted by the signal handler
pub struct CriticalSection<'a> {
    _internal_cs: critical_section::CriticalSection<'a>,
}

impl<'a> CriticalSection<'a> {
    fn new(internal_cs: critical_section::CriticalSection<'a>) -> Self {
        Self {
            _internal_cs: internal_cs,
        }
    }
}

/// Run `f` with interrupts masked, passing it the critical section token
pub fn locked<F, R>(f: F) -> R
where
    F: FnOnce(&CriticalSection) -> R,
{
    critical_section::with(|cs| f(&CriticalSection::new(cs)))
}
