use crate::Micros;

use super::{ChannelOutput, CompareTimer, OutputChannel, ScheduleCore, ScheduleStatus};

/// Injector pulse schedule for one fuel channel.
#[derive(Debug)]
pub struct FuelSchedule<T> {
    core: ScheduleCore<T>,
}

impl<T: CompareTimer> FuelSchedule<T> {
    #[must_use]
    pub const fn new(index: u8, timer: T) -> Self {
        Self {
            core: ScheduleCore::new(OutputChannel::injector(index), timer),
        }
    }

    /// Builds one schedule per timer, numbering channels from 0.
    #[must_use]
    pub fn bank<const N: usize>(timers: [T; N]) -> [Self; N] {
        let mut index = 0u8;
        timers.map(|timer| {
            let schedule = Self::new(index, timer);
            index = index.saturating_add(1);
            schedule
        })
    }

    /// Opens the injector `timeout` from now for `duration`.
    ///
    /// While the injector is open the request is queued behind the current
    /// pulse instead; queued requests whose timeout overflows the timer are
    /// dropped and `false` is returned.
    pub fn arm(&mut self, timeout: Micros, duration: Micros) -> bool {
        self.core.arm(timeout, duration, false)
    }

    /// Compare-match interrupt handler.
    pub fn on_compare<O: ChannelOutput>(&mut self, output: &mut O) -> ScheduleStatus {
        self.core.on_compare(output, None)
    }

    /// Cancels a pulse that has not started and drops any queued follow-up.
    pub fn disable_pending(&mut self) {
        self.core.disable_pending();
    }

    pub fn reset(&mut self) {
        self.core.reset();
    }

    /// Closes an open injector and returns to `Off`.
    pub fn force_off<O: ChannelOutput>(&mut self, output: &mut O) {
        self.core.force_off(output);
    }

    #[must_use]
    pub const fn status(&self) -> ScheduleStatus {
        self.core.status()
    }

    #[must_use]
    pub const fn channel(&self) -> OutputChannel {
        self.core.channel()
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.core.has_next()
    }

    #[must_use]
    pub const fn start_compare(&self) -> u16 {
        self.core.start_compare()
    }

    #[must_use]
    pub const fn end_compare(&self) -> u16 {
        self.core.end_compare()
    }

    /// Pulses started since power-on.
    #[must_use]
    pub const fn starts(&self) -> u32 {
        self.core.starts()
    }

    /// Pulses completed since power-on.
    #[must_use]
    pub const fn completions(&self) -> u32 {
        self.core.completions()
    }

    #[must_use]
    pub const fn timer(&self) -> &T {
        self.core.timer()
    }

    pub fn timer_mut(&mut self) -> &mut T {
        self.core.timer_mut()
    }
}
