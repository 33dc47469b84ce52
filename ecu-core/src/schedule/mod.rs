//! Timer-compare driven output schedules.
//!
//! Each injector or coil channel owns one compare channel of a free-running
//! 16-bit timer. A schedule moves `Off -> Pending -> Running -> Off`: the first
//! compare match switches the output on, the second switches it off. A new
//! request that arrives while the output is on is queued and becomes the next
//! pending event when the current one ends.

mod fuel;
mod ignition;
pub mod sim;

use core::fmt;

use crate::Micros;

pub use fuel::FuelSchedule;
pub use ignition::IgnitionSchedule;

/// Microseconds per timer tick as a shift (4 us ticks).
pub const TICK_SHIFT: u32 = 2;
const COUNTER_MAX: u32 = 0xFFFF;
/// Longest delay a 16-bit compare can express.
pub const MAX_TIMER_PERIOD: Micros = COUNTER_MAX << TICK_SHIFT;

/// Converts microseconds into timer ticks, saturating at the counter width.
#[must_use]
pub const fn micros_to_ticks(micros: Micros) -> u16 {
    let ticks = micros >> TICK_SHIFT;
    if ticks > COUNTER_MAX {
        u16::MAX
    } else {
        #[allow(clippy::cast_possible_truncation)]
        let ticks = ticks as u16;
        ticks
    }
}

/// One compare channel of a free-running hardware timer.
pub trait CompareTimer {
    /// Current counter value in ticks.
    fn counter(&self) -> u16;

    /// Programs the compare register; the interrupt fires when the counter reaches it.
    fn set_compare(&mut self, value: u16);

    /// Enables the compare interrupt.
    fn enable(&mut self);

    /// Disables the compare interrupt.
    fn disable(&mut self);
}

/// Kind of output a schedule drives.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputKind {
    Injector,
    Coil,
}

/// Identifies a physical output for [`ChannelOutput`] callbacks.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OutputChannel {
    pub kind: OutputKind,
    pub index: u8,
}

impl OutputChannel {
    #[must_use]
    pub const fn injector(index: u8) -> Self {
        Self {
            kind: OutputKind::Injector,
            index,
        }
    }

    #[must_use]
    pub const fn coil(index: u8) -> Self {
        Self {
            kind: OutputKind::Coil,
            index,
        }
    }
}

impl fmt::Display for OutputChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OutputKind::Injector => write!(f, "inj{}", self.index + 1),
            OutputKind::Coil => write!(f, "ign{}", self.index + 1),
        }
    }
}

/// Output pins toggled from schedule callbacks.
///
/// Injectors open on `begin` and close on `end`; coils start dwelling on
/// `begin` and spark on `end`.
pub trait ChannelOutput {
    fn begin(&mut self, channel: OutputChannel);
    fn end(&mut self, channel: OutputChannel);
}

/// Output that ignores every callback.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopOutput;

impl ChannelOutput for NoopOutput {
    fn begin(&mut self, _channel: OutputChannel) {}

    fn end(&mut self, _channel: OutputChannel) {}
}

/// Position of a schedule in its on/off cycle.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ScheduleStatus {
    #[default]
    Off,
    Pending,
    Running,
}

impl ScheduleStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ScheduleStatus::Off => "off",
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::Running => "running",
        }
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compare bookkeeping shared by fuel and ignition schedules.
#[derive(Debug)]
pub(crate) struct ScheduleCore<T> {
    timer: T,
    channel: OutputChannel,
    status: ScheduleStatus,
    duration: Micros,
    start_compare: u16,
    end_compare: u16,
    next_start_compare: u16,
    next_end_compare: u16,
    next_duration: Micros,
    /// End compare that was live when the follow-up was queued.
    next_queued_behind: u16,
    has_next: bool,
    starts: u32,
    completions: u32,
}

impl<T: CompareTimer> ScheduleCore<T> {
    pub(crate) const fn new(channel: OutputChannel, timer: T) -> Self {
        Self {
            timer,
            channel,
            status: ScheduleStatus::Off,
            duration: 0,
            start_compare: 0,
            end_compare: 0,
            next_start_compare: 0,
            next_end_compare: 0,
            next_duration: 0,
            next_queued_behind: 0,
            has_next: false,
            starts: 0,
            completions: 0,
        }
    }

    /// Arms the schedule; `keep_end` preserves an end compare set ahead of time.
    ///
    /// Returns `false` when a follow-up request was dropped because its
    /// timeout does not fit the timer.
    pub(crate) fn arm(&mut self, timeout: Micros, duration: Micros, keep_end: bool) -> bool {
        if self.status != ScheduleStatus::Running {
            let timeout = if timeout > MAX_TIMER_PERIOD {
                MAX_TIMER_PERIOD - 1
            } else {
                timeout
            };
            critical_section::with(|_| {
                self.start_compare = self.timer.counter().wrapping_add(micros_to_ticks(timeout));
                if !keep_end {
                    self.end_compare = self.start_compare.wrapping_add(micros_to_ticks(duration));
                }
                self.duration = duration;
                self.timer.set_compare(self.start_compare);
                self.status = ScheduleStatus::Pending;
            });
            self.timer.enable();
            true
        } else if timeout < MAX_TIMER_PERIOD {
            critical_section::with(|_| {
                let now = self.timer.counter();
                let start = micros_to_ticks(timeout);
                // A start inside the running event queues right behind its end.
                self.next_start_compare = if start <= self.end_compare.wrapping_sub(now) {
                    self.end_compare.wrapping_add(1)
                } else {
                    now.wrapping_add(start)
                };
                self.next_queued_behind = self.end_compare;
                self.next_end_compare = self
                    .next_start_compare
                    .wrapping_add(micros_to_ticks(duration));
                self.next_duration = duration;
                self.has_next = true;
            });
            true
        } else {
            false
        }
    }

    /// Compare-match handler. `end_override` replaces the computed end compare.
    pub(crate) fn on_compare<O: ChannelOutput>(
        &mut self,
        output: &mut O,
        end_override: Option<u16>,
    ) -> ScheduleStatus {
        match self.status {
            ScheduleStatus::Pending => {
                output.begin(self.channel);
                self.starts = self.starts.wrapping_add(1);
                self.status = ScheduleStatus::Running;
                self.end_compare = end_override.unwrap_or_else(|| {
                    self.timer
                        .counter()
                        .wrapping_add(micros_to_ticks(self.duration))
                });
                self.timer.set_compare(self.end_compare);
            }
            ScheduleStatus::Running => {
                output.end(self.channel);
                self.completions = self.completions.wrapping_add(1);
                self.status = ScheduleStatus::Off;
                if self.has_next {
                    // The end may have moved past the queued start since it was queued.
                    let lead = self.next_start_compare.wrapping_sub(self.next_queued_behind);
                    let elapsed = self.timer.counter().wrapping_sub(self.next_queued_behind);
                    if elapsed < u16::MAX / 2 && elapsed >= lead {
                        self.next_start_compare = self.timer.counter().wrapping_add(1);
                        self.next_end_compare = self
                            .next_start_compare
                            .wrapping_add(micros_to_ticks(self.next_duration));
                    }
                    self.start_compare = self.next_start_compare;
                    self.end_compare = self.next_end_compare;
                    self.duration = self.next_duration;
                    self.has_next = false;
                    self.timer.set_compare(self.start_compare);
                    self.status = ScheduleStatus::Pending;
                } else {
                    self.timer.disable();
                }
            }
            ScheduleStatus::Off => self.timer.disable(),
        }
        self.status
    }

    pub(crate) fn disable_pending(&mut self) {
        critical_section::with(|_| match self.status {
            ScheduleStatus::Pending => {
                self.status = ScheduleStatus::Off;
                self.timer.disable();
            }
            ScheduleStatus::Running => self.has_next = false,
            ScheduleStatus::Off => {}
        });
    }

    pub(crate) fn reset(&mut self) {
        self.status = ScheduleStatus::Off;
        self.has_next = false;
        self.timer.disable();
    }

    /// Resets to `Off`, ending the output first if it is on.
    pub(crate) fn force_off<O: ChannelOutput>(&mut self, output: &mut O) {
        if self.status == ScheduleStatus::Running {
            output.end(self.channel);
        }
        self.reset();
    }

    /// Rewrites the live compare of a running schedule to `delay` from now.
    pub(crate) fn rewrite_running_end(&mut self, delay: Micros) -> bool {
        if self.status != ScheduleStatus::Running {
            return false;
        }
        self.end_compare = self.timer.counter().wrapping_add(micros_to_ticks(delay));
        self.timer.set_compare(self.end_compare);
        true
    }

    /// Stores an end compare `delay` from now for a pending schedule.
    pub(crate) fn preset_end(&mut self, delay: Micros) -> bool {
        if self.status != ScheduleStatus::Pending {
            return false;
        }
        self.end_compare = self.timer.counter().wrapping_add(micros_to_ticks(delay));
        true
    }

    pub(crate) const fn status(&self) -> ScheduleStatus {
        self.status
    }

    pub(crate) const fn channel(&self) -> OutputChannel {
        self.channel
    }

    pub(crate) const fn start_compare(&self) -> u16 {
        self.start_compare
    }

    pub(crate) const fn end_compare(&self) -> u16 {
        self.end_compare
    }

    pub(crate) const fn has_next(&self) -> bool {
        self.has_next
    }

    pub(crate) const fn starts(&self) -> u32 {
        self.starts
    }

    pub(crate) const fn completions(&self) -> u32 {
        self.completions
    }

    pub(crate) const fn timer(&self) -> &T {
        &self.timer
    }

    pub(crate) fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }
}
