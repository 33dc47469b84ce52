//! Fixed-point angle/time conversion and revolution-time bookkeeping.
//!
//! Every decoder measures the duration of one crank revolution and stores it in
//! a [`RevolutionTiming`]. The two derived factors (microseconds per degree and
//! degrees per microsecond) are recomputed only when the revolution time
//! changes so the interrupt paths never divide.

use crate::Micros;

/// Microseconds in one minute, the numerator of every RPM calculation.
pub const MICROS_PER_MINUTE: u32 = 60_000_000;
/// Degrees in one crank revolution.
pub const DEGREES_PER_REVOLUTION: u16 = 360;
/// Degrees in one four-stroke engine cycle.
pub const DEGREES_PER_CYCLE: u16 = 720;

/// Fractional bits of the microseconds-per-degree factor (UQ24.8).
const MICROS_PER_DEGREE_SHIFT: u32 = 8;
/// Fractional bits of the degrees-per-microsecond factor (UQ8.24).
///
/// At 50 RPM a degree takes 3.3 ms, so 16 fractional bits would leave
/// several degrees of error across a revolution.
const DEGREES_PER_MICRO_SHIFT: u32 = 24;

/// Revolution time plus the fixed-point conversion factors derived from it.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RevolutionTiming {
    revolution_time: Micros,
    micros_per_degree: u32,
    degrees_per_micro: u32,
}

impl RevolutionTiming {
    /// Timing with an unknown revolution time; every conversion yields zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            revolution_time: 0,
            micros_per_degree: 0,
            degrees_per_micro: 0,
        }
    }

    /// Builds timing for a known revolution time.
    #[must_use]
    pub fn with_revolution_time(revolution_time: Micros) -> Self {
        let mut timing = Self::new();
        timing.set_revolution_time(revolution_time);
        timing
    }

    /// Stores a new revolution time and refreshes the conversion factors.
    ///
    /// Returns `true` when the value changed, letting callers skip a redundant
    /// RPM recomputation.
    pub fn set_revolution_time(&mut self, revolution_time: Micros) -> bool {
        if revolution_time == self.revolution_time {
            return false;
        }

        self.revolution_time = revolution_time;
        if revolution_time == 0 {
            self.micros_per_degree = 0;
            self.degrees_per_micro = 0;
        } else {
            let revolution = u64::from(revolution_time);
            self.micros_per_degree = saturate_u32(div_round(
                revolution << MICROS_PER_DEGREE_SHIFT,
                u64::from(DEGREES_PER_REVOLUTION),
            ));
            self.degrees_per_micro = saturate_u32(div_round(
                u64::from(DEGREES_PER_REVOLUTION) << DEGREES_PER_MICRO_SHIFT,
                revolution,
            ));
        }
        true
    }

    /// Duration of the most recent revolution, or 0 when unknown.
    #[must_use]
    pub const fn revolution_time(&self) -> Micros {
        self.revolution_time
    }

    /// Converts a crank angle (degrees) into a duration at the current speed.
    #[must_use]
    pub fn angle_to_time(&self, angle: u16) -> Micros {
        let scaled = u64::from(angle) * u64::from(self.micros_per_degree);
        saturate_u32(round_shift(scaled, MICROS_PER_DEGREE_SHIFT))
    }

    /// Converts a duration into the crank angle (degrees) swept at the current speed.
    #[must_use]
    pub fn time_to_angle(&self, duration: Micros) -> u32 {
        let scaled = u64::from(duration) * u64::from(self.degrees_per_micro);
        saturate_u32(round_shift(scaled, DEGREES_PER_MICRO_SHIFT))
    }

    /// RPM derived from the stored revolution time.
    #[must_use]
    pub fn rpm(&self, max_rpm: u16) -> u16 {
        rpm_from_revolution_time(self.revolution_time, max_rpm)
    }
}

/// `60,000,000 / revolution_time`, rounded to nearest and clamped to `max_rpm`.
///
/// A revolution time of zero means the speed is unknown and yields 0.
#[must_use]
pub fn rpm_from_revolution_time(revolution_time: Micros, max_rpm: u16) -> u16 {
    if revolution_time == 0 {
        return 0;
    }

    let rpm = div_round(u64::from(MICROS_PER_MINUTE), u64::from(revolution_time));
    match u16::try_from(rpm) {
        Ok(value) => value.min(max_rpm),
        Err(_) => max_rpm,
    }
}

/// Inverse of [`rpm_from_revolution_time`]; 0 RPM maps to an unknown revolution time.
#[must_use]
pub fn revolution_time_from_rpm(rpm: u16) -> Micros {
    if rpm == 0 {
        return 0;
    }
    saturate_u32(div_round(u64::from(MICROS_PER_MINUTE), u64::from(rpm)))
}

/// Revolution time estimated from a single tooth gap on an evenly spaced wheel.
#[must_use]
pub fn revolution_time_from_tooth_gap(tooth_gap: Micros, teeth_per_revolution: u16) -> Micros {
    tooth_gap.saturating_mul(u32::from(teeth_per_revolution))
}

/// Wraps `angle` into `[0, cycle)`.
#[must_use]
pub fn wrap_angle(angle: i32, cycle: u16) -> i16 {
    if cycle == 0 {
        return 0;
    }
    let wrapped = angle.rem_euclid(i32::from(cycle));
    i16::try_from(wrapped).unwrap_or(0)
}

/// Cycle lengths used to wrap ignition and injection angles.
///
/// Sequential four-stroke operation uses the full 720 degree cycle; wasted
/// spark and batch injection repeat every revolution.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CycleLimits {
    pub ignition: u16,
    pub injection: u16,
}

impl CycleLimits {
    #[must_use]
    pub const fn new(ignition: u16, injection: u16) -> Self {
        Self {
            ignition,
            injection,
        }
    }

    /// Wraps an ignition angle into `[0, ignition)`.
    #[must_use]
    pub fn ignition_limits(&self, angle: i32) -> i16 {
        wrap_angle(angle, self.ignition)
    }

    /// Wraps an injection angle into `[0, injection)`.
    #[must_use]
    pub fn injector_limits(&self, angle: i32) -> i16 {
        wrap_angle(angle, self.injection)
    }
}

impl Default for CycleLimits {
    fn default() -> Self {
        Self::new(DEGREES_PER_REVOLUTION, DEGREES_PER_REVOLUTION)
    }
}

fn div_round(numerator: u64, denominator: u64) -> u64 {
    (numerator + denominator / 2) / denominator
}

fn round_shift(value: u64, shift: u32) -> u64 {
    (value + (1 << (shift - 1))) >> shift
}

fn saturate_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
