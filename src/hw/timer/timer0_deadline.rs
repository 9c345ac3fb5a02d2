//! Deadline implementation based on the TIMER0 peripheral available in nRF MCUs
//!
//! The multiplexer owns TIMER0 during a timeslot and configures it to run at 1 MHz from the
//! start of the slot, so compare values are offsets in microseconds from the slot start.

use super::DeadlineTimer;
use core::ops::Deref;

use nrf52840_hal::pac::timer0;
type TimerRegisterBlock = timer0::RegisterBlock;

struct TimerPeriphWrapper {
    ptr: *const TimerRegisterBlock,
}
impl TimerPeriphWrapper {
    pub fn new(timer: &TimerRegisterBlock) -> Self {
        TimerPeriphWrapper { ptr: timer }
    }
}
impl Deref for TimerPeriphWrapper {
    type Target = TimerRegisterBlock;
    fn deref(&self) -> &Self::Target {
        unsafe { &*self.ptr }
    }
}
// Safety: the register block lives for the whole program and all accesses are single register
// writes performed from the multiplexer's signal handler.
unsafe impl Sync for TimerPeriphWrapper {}

const DEADLINE_CC: usize = 0;

/// Deadline based on the compare channel 0 of the `TIMER0` peripheral
pub struct Timer0Deadline {
    timer: TimerPeriphWrapper,
}

impl Timer0Deadline {
    /// Create a new [`Timer0Deadline`] instance using passed hardware TIMER instance
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn main() {
    /// use nrf_timeslot::hw::timer::timer0_deadline::Timer0Deadline;
    /// use nrf52840_hal::pac::Peripherals;
    ///
    /// let peripherals = Peripherals::take().unwrap();
    ///
    /// let deadline = Timer0Deadline::new(&peripherals.TIMER0);
    /// # }
    /// ```
    pub fn new(timer: &TimerRegisterBlock) -> Self {
        Self {
            timer: TimerPeriphWrapper::new(timer),
        }
    }
}

impl DeadlineTimer for Timer0Deadline {
    fn arm(&self, offset_us: u32) {
        self.timer.events_compare[DEADLINE_CC].write(|w| w.events_compare().clear_bit());
        self.timer.cc[DEADLINE_CC].write(|w| w.cc().variant(offset_us));
        self.timer.intenset.write(|w| w.compare0().set_bit());

        #[cfg(feature = "nrf52840")]
        // Safety: TIMER0 is handed over by the multiplexer for the duration of the timeslot and
        // its interrupt is routed to the multiplexer's handler.
        unsafe {
            cortex_m::peripheral::NVIC::unmask(nrf52840_hal::pac::Interrupt::TIMER0)
        };
    }

    fn acknowledge(&self) {
        self.timer.intenclr.write(|w| w.compare0().set_bit());
        self.timer.events_compare[DEADLINE_CC].write(|w| w.events_compare().clear_bit());
    }
}
