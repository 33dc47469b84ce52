use crate::Micros;

use super::{ChannelOutput, CompareTimer, OutputChannel, ScheduleCore, ScheduleStatus};

/// Dwell-and-spark schedule for one ignition channel.
///
/// Besides the plain schedule behaviour the end (spark) compare can be moved
/// by per-tooth corrections: directly while the coil is dwelling, or preset
/// while the dwell is still pending.
#[derive(Debug)]
pub struct IgnitionSchedule<T> {
    core: ScheduleCore<T>,
    end_set_by_decoder: bool,
}

impl<T: CompareTimer> IgnitionSchedule<T> {
    #[must_use]
    pub const fn new(index: u8, timer: T) -> Self {
        Self {
            core: ScheduleCore::new(OutputChannel::coil(index), timer),
            end_set_by_decoder: false,
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

    /// Starts dwelling `timeout` from now and sparks `duration` later.
    ///
    /// An end compare preset by the decoder is kept.
    pub fn arm(&mut self, timeout: Micros, duration: Micros) -> bool {
        self.core.arm(timeout, duration, self.end_set_by_decoder)
    }

    /// Compare-match interrupt handler.
    pub fn on_compare<O: ChannelOutput>(&mut self, output: &mut O) -> ScheduleStatus {
        let end_override = match self.core.status() {
            ScheduleStatus::Pending if self.end_set_by_decoder => Some(self.core.end_compare()),
            _ => None,
        };
        let was_running = self.core.status() == ScheduleStatus::Running;
        let status = self.core.on_compare(output, end_override);
        if was_running {
            self.end_set_by_decoder = false;
        }
        status
    }

    /// Moves the spark of a dwelling coil to `delay` from now.
    pub fn retarget_running_end(&mut self, delay: Micros) -> bool {
        self.core.rewrite_running_end(delay)
    }

    /// Presets the spark `delay` from now for a coil that has not started dwelling.
    pub fn preset_end(&mut self, delay: Micros) -> bool {
        let stored = self.core.preset_end(delay);
        if stored {
            self.end_set_by_decoder = true;
        }
        stored
    }

    /// Cancels a dwell that has not started and drops any queued follow-up.
    pub fn disable_pending(&mut self) {
        self.core.disable_pending();
        if self.core.status() == ScheduleStatus::Off {
            self.end_set_by_decoder = false;
        }
    }

    pub fn reset(&mut self) {
        self.core.reset();
        self.end_set_by_decoder = false;
    }

    /// Sparks a dwelling coil and returns to `Off`.
    pub fn force_off<O: ChannelOutput>(&mut self, output: &mut O) {
        self.core.force_off(output);
        self.end_set_by_decoder = false;
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

    /// End compare was preset by a per-tooth correction.
    #[must_use]
    pub const fn end_set_by_decoder(&self) -> bool {
        self.end_set_by_decoder
    }

    #[must_use]
    pub const fn start_compare(&self) -> u16 {
        self.core.start_compare()
    }

    #[must_use]
    pub const fn end_compare(&self) -> u16 {
        self.core.end_compare()
    }

    /// Dwell periods started since power-on.
    #[must_use]
    pub const fn starts(&self) -> u32 {
        self.core.starts()
    }

    /// Sparks fired since power-on.
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
