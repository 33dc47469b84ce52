//! Per-channel angle bookkeeping: which crank angle each injector and coil
//! event starts and ends at, and how far away that is in time.
//!
//! Angles are degrees after TDC of cylinder 1. A channel's TDC offset shifts
//! the whole event to its own cylinder; everything is wrapped to the cycle
//! length from [`CycleLimits`].

use core::fmt;

use crate::Micros;
use crate::config::{ConfigError, MAX_CHANNELS, Strokes, TriggerConfig};
use crate::timing::{CycleLimits, DEGREES_PER_CYCLE, RevolutionTiming};

/// Output channel counts and firing offsets.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChannelLayout {
    pub fuel_channels: u8,
    pub ignition_channels: u8,
    /// TDC offset of each injector channel.
    pub fuel_tdc: [i16; MAX_CHANNELS],
    /// TDC offset of each coil channel.
    pub ignition_tdc: [i16; MAX_CHANNELS],
    pub limits: CycleLimits,
}

impl ChannelLayout {
    /// Evenly spaced channels across the cycle, channel 1 at TDC.
    #[must_use]
    pub fn even_fire(channels: u8, limits: CycleLimits) -> Self {
        let count = channels.max(1);
        let ignition_spacing = limits.ignition / u16::from(count);
        let fuel_spacing = limits.injection / u16::from(count);

        let mut fuel_tdc = [0; MAX_CHANNELS];
        let mut ignition_tdc = [0; MAX_CHANNELS];
        for (index, (fuel, ignition)) in fuel_tdc
            .iter_mut()
            .zip(ignition_tdc.iter_mut())
            .take(usize::from(count))
            .enumerate()
        {
            let step = u16::try_from(index).unwrap_or(0);
            *fuel = i16::try_from(fuel_spacing * step).unwrap_or(0);
            *ignition = i16::try_from(ignition_spacing * step).unwrap_or(0);
        }

        Self {
            fuel_channels: channels,
            ignition_channels: channels,
            fuel_tdc,
            ignition_tdc,
            limits,
        }
    }

    /// Layout for an even-fire engine described by `config`.
    ///
    /// Sequential four-stroke engines get one channel per cylinder over 720
    /// degrees. Otherwise paired cylinders share a channel (wasted spark and
    /// semi-sequential injection), which needs an even cylinder count.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedCylinderCount`] for odd cylinder
    /// counts without sequential operation.
    pub fn for_engine(config: &TriggerConfig) -> Result<Self, ConfigError> {
        let cylinders = config.cylinders;
        let cycle = config.cycle_angle();
        let limits = CycleLimits::new(cycle, cycle);

        let channels = if cycle == DEGREES_PER_CYCLE
            || cylinders == 1
            || config.strokes == Strokes::Two
        {
            cylinders
        } else if cylinders % 2 == 0 {
            cylinders / 2
        } else {
            return Err(ConfigError::UnsupportedCylinderCount(cylinders));
        };

        let layout = Self::even_fire(channels, limits);
        layout.validate()?;
        Ok(layout)
    }

    /// Overrides the channel counts, e.g. to match the outputs a board provides.
    #[must_use]
    pub const fn with_channels(mut self, fuel: u8, ignition: u8) -> Self {
        self.fuel_channels = fuel;
        self.ignition_channels = ignition;
        self
    }

    /// Checks the channel counts against [`MAX_CHANNELS`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TooManyChannels`] for an oversized count.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for count in [self.fuel_channels, self.ignition_channels] {
            if usize::from(count) > MAX_CHANNELS {
                return Err(ConfigError::TooManyChannels(count));
            }
        }
        Ok(())
    }
}

impl Default for ChannelLayout {
    fn default() -> Self {
        Self::even_fire(2, CycleLimits::default())
    }
}

/// A channel index outside the configured layout.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChannelError {
    OutOfRange { index: usize, channels: usize },
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::OutOfRange { index, channels } => {
                write!(f, "channel {index} out of range (have {channels})")
            }
        }
    }
}

/// Dwell start and spark angles of one coil event.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct IgnitionAngles {
    pub start: i16,
    pub end: i16,
}

/// Spark at `advance` degrees before the channel's TDC, dwell starting
/// `dwell_angle` earlier. An offset of 0 is treated as the end of the cycle.
#[must_use]
pub fn ignition_angles(
    tdc_offset: i16,
    advance: i16,
    dwell_angle: u16,
    limits: &CycleLimits,
) -> IgnitionAngles {
    let tdc = if tdc_offset == 0 {
        i32::from(limits.ignition)
    } else {
        i32::from(tdc_offset)
    };
    let end = limits.ignition_limits(tdc - i32::from(advance));
    let start = limits.ignition_limits(i32::from(end) - i32::from(dwell_angle));
    IgnitionAngles { start, end }
}

/// Injector opening angle so the pulse ends at `injection_angle` past the channel's TDC.
#[must_use]
pub fn injector_start_angle(
    injection_angle: u16,
    tdc_offset: i16,
    pulse_width_angle: u16,
    limits: &CycleLimits,
) -> i16 {
    limits.injector_limits(
        i32::from(injection_angle) + i32::from(tdc_offset) - i32::from(pulse_width_angle),
    )
}

/// Delay from `crank_angle` until `start_angle`.
///
/// A start angle already behind the crank yields `None`, unless the channel
/// is running: then the event belongs to the next cycle and is queued behind
/// the current one.
#[must_use]
pub fn schedule_timeout(
    start_angle: i16,
    crank_angle: i16,
    cycle: u16,
    running: bool,
    timing: &RevolutionTiming,
) -> Option<Micros> {
    let mut delta = i32::from(start_angle) - i32::from(crank_angle);
    if delta <= 0 {
        if !running {
            return None;
        }
        delta += i32::from(cycle);
    }
    let delta = u16::try_from(delta).ok()?;
    match timing.angle_to_time(delta) {
        0 => None,
        timeout => Some(timeout),
    }
}

/// Angle bookkeeping for one injector.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct FuelChannel {
    pub tdc_offset: i16,
    pub start_angle: i16,
    pub end_angle: i16,
}

impl FuelChannel {
    #[must_use]
    pub const fn new(tdc_offset: i16) -> Self {
        Self {
            tdc_offset,
            start_angle: 0,
            end_angle: 0,
        }
    }

    /// Recomputes the opening angle for this cycle's request.
    pub fn update(&mut self, injection_angle: u16, pulse_width_angle: u16, limits: &CycleLimits) {
        self.start_angle =
            injector_start_angle(injection_angle, self.tdc_offset, pulse_width_angle, limits);
        self.end_angle = limits.injector_limits(
            i32::from(self.start_angle) + i32::from(pulse_width_angle),
        );
    }
}

/// Angle bookkeeping for one coil, including its per-tooth end tooth.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct IgnitionChannel {
    pub tdc_offset: i16,
    pub start_angle: i16,
    pub end_angle: i16,
    /// Tooth on which the spark time is refined; 0 disables per-tooth timing.
    pub end_tooth: u16,
}

impl IgnitionChannel {
    #[must_use]
    pub const fn new(tdc_offset: i16) -> Self {
        Self {
            tdc_offset,
            start_angle: 0,
            end_angle: 0,
            end_tooth: 0,
        }
    }

    /// Recomputes dwell and spark angles; returns `true` when the spark angle moved.
    pub fn update(&mut self, advance: i16, dwell_angle: u16, limits: &CycleLimits) -> bool {
        let angles = ignition_angles(self.tdc_offset, advance, dwell_angle, limits);
        let moved = angles.end != self.end_angle;
        self.start_angle = angles.start;
        self.end_angle = angles.end;
        moved
    }
}
