//! Compare channels on the embassy time base.
//!
//! The embassy time driver runs on TIM1 at 1 MHz. Each [`TickCompare`] views
//! that clock as the 16-bit, 4 us per tick counter the schedules expect and
//! converts a compare write into an absolute deadline. The compare task sleeps
//! until the earliest deadline and runs the matching schedule's handler.

use ecu_core::Micros;
use ecu_core::schedule::{CompareTimer, TICK_SHIFT};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Instant;

/// Raised whenever a compare value is written or a channel is enabled.
pub static COMPARE_CHANGED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

const TICK_MASK: u64 = (1 << TICK_SHIFT) - 1;

/// Current time as a wrapping microsecond timestamp.
pub fn micros_now() -> Micros {
    // Truncation is the wrap.
    #[allow(clippy::cast_possible_truncation)]
    let micros = Instant::now().as_micros() as Micros;
    micros
}

/// One compare channel of the virtual 16-bit timer.
#[derive(Debug)]
pub struct TickCompare {
    deadline: Instant,
    enabled: bool,
}

impl TickCompare {
    pub const fn new() -> Self {
        Self {
            deadline: Instant::from_ticks(0),
            enabled: false,
        }
    }

    /// Instant at which the armed compare fires.
    pub fn deadline(&self) -> Option<Instant> {
        self.enabled.then_some(self.deadline)
    }

    /// The compare is enabled and its deadline has passed.
    pub fn is_due(&self, now: Instant) -> bool {
        self.enabled && self.deadline <= now
    }
}

impl Default for TickCompare {
    fn default() -> Self {
        Self::new()
    }
}

impl CompareTimer for TickCompare {
    fn counter(&self) -> u16 {
        #[allow(clippy::cast_possible_truncation)]
        let ticks = (Instant::now().as_micros() >> TICK_SHIFT) as u16;
        ticks
    }

    fn set_compare(&mut self, value: u16) {
        let now = Instant::now().as_micros();
        #[allow(clippy::cast_possible_truncation)]
        let counter = (now >> TICK_SHIFT) as u16;
        let delta = u64::from(value.wrapping_sub(counter)) << TICK_SHIFT;
        self.deadline = Instant::from_micros((now & !TICK_MASK) + delta);
        COMPARE_CHANGED.signal(());
    }

    fn enable(&mut self) {
        self.enabled = true;
        COMPARE_CHANGED.signal(());
    }

    fn disable(&mut self) {
        self.enabled = false;
    }
}
