//! Simulated compare timer for host tooling and tests.
//!
//! [`SimClock`] is the shared microsecond clock; every [`SimTimer`] derives its
//! 16-bit tick counter from it exactly like a hardware timer clocked at 4 us.

use core::cell::Cell;

use super::{CompareTimer, TICK_SHIFT};
use crate::Micros;

/// Microsecond clock advanced explicitly by the driver.
#[derive(Debug, Default)]
pub struct SimClock {
    now: Cell<Micros>,
}

impl SimClock {
    #[must_use]
    pub const fn new(start: Micros) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    #[must_use]
    pub fn now(&self) -> Micros {
        self.now.get()
    }

    pub fn set(&self, now: Micros) {
        self.now.set(now);
    }

    pub fn advance(&self, delta: Micros) {
        self.now.set(self.now.get().wrapping_add(delta));
    }
}

/// One compare channel driven by a [`SimClock`].
#[derive(Debug)]
pub struct SimTimer<'a> {
    clock: &'a SimClock,
    compare: u16,
    enabled: bool,
}

impl<'a> SimTimer<'a> {
    #[must_use]
    pub const fn new(clock: &'a SimClock) -> Self {
        Self {
            clock,
            compare: 0,
            enabled: false,
        }
    }

    #[must_use]
    pub const fn compare(&self) -> u16 {
        self.compare
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Clock time at which the counter next equals the compare value.
    #[must_use]
    pub fn next_match(&self) -> Option<Micros> {
        if !self.enabled {
            return None;
        }
        let delta = self.compare.wrapping_sub(self.counter());
        let tick_start = self.clock.now() & !((1 << TICK_SHIFT) - 1);
        Some(tick_start.wrapping_add(u32::from(delta) << TICK_SHIFT))
    }

    /// Compare matches at the current clock time.
    #[must_use]
    pub fn is_due(&self) -> bool {
        self.enabled && self.counter() == self.compare
    }
}

impl CompareTimer for SimTimer<'_> {
    fn counter(&self) -> u16 {
        // The counter is the low 16 bits of the tick count.
        #[allow(clippy::cast_possible_truncation)]
        let ticks = (self.clock.now() >> TICK_SHIFT) as u16;
        ticks
    }

    fn set_compare(&mut self, value: u16) {
        self.compare = value;
    }

    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }
}
