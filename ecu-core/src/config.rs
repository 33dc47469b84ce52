//! Trigger wheel and engine configuration consumed by the decoders.
//!
//! Values mirror what a tuning tool would store for the trigger setup page:
//! wheel geometry, trigger offset, noise filtering and whether sequential
//! operation needs a cam signal. Everything is `Copy` so the decoder can keep
//! its own snapshot without borrowing from the configuration store.

use core::fmt;

use crate::decoders::TriggerPattern;

/// Highest number of injector or coil channels the core drives.
pub const MAX_CHANNELS: usize = 8;

/// Default upper bound applied to every RPM calculation.
pub const DEFAULT_MAX_RPM: u16 = 18_000;
/// Default threshold below which the engine is treated as cranking.
pub const DEFAULT_CRANKING_RPM: u16 = 400;

/// Edge(s) of a sensor signal that count as a tooth.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EdgeTrigger {
    Rising,
    Falling,
    Both,
}

/// Rotational speed of the primary trigger wheel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WheelSpeed {
    /// Wheel turns once per crank revolution.
    Crank,
    /// Wheel turns once per engine cycle (half crank speed).
    Cam,
}

/// Engine stroke count.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Strokes {
    Two,
    Four,
}

/// Pattern on the secondary (cam) input of missing-tooth style wheels.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SecondaryPattern {
    /// One cam tooth per engine cycle.
    Single,
    /// Four evenly spaced cam teeth with one missing.
    FourMinusOne,
}

/// Noise filter aggressiveness expressed as a fraction of the previous gap.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FilterLevel {
    Off,
    /// 25% of the previous gap.
    Lite,
    /// 50% of the previous gap.
    Medium,
    /// 75% of the previous gap.
    Aggressive,
}

impl FilterLevel {
    /// Minimum acceptable gap for the next edge given the gap just measured.
    #[must_use]
    pub const fn threshold(self, gap: u32) -> u32 {
        match self {
            FilterLevel::Off => 0,
            FilterLevel::Lite => gap >> 2,
            FilterLevel::Medium => gap >> 1,
            FilterLevel::Aggressive => (gap >> 2).saturating_mul(3),
        }
    }
}

/// Trigger setup shared by every decoder variant.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TriggerConfig {
    pub pattern: TriggerPattern,
    /// Nominal tooth positions on the primary wheel, including missing ones.
    pub teeth: u16,
    /// Missing teeth forming the reference gap.
    pub missing_teeth: u8,
    /// Crank angle (degrees ATDC of cylinder 1) at which tooth 1 passes the sensor.
    pub trigger_angle: i16,
    pub speed: WheelSpeed,
    pub secondary: SecondaryPattern,
    pub primary_edge: EdgeTrigger,
    pub secondary_edge: EdgeTrigger,
    pub tertiary_edge: EdgeTrigger,
    pub filter: FilterLevel,
    pub cylinders: u8,
    pub strokes: Strokes,
    /// Sequential fuel or ignition is enabled and needs cam phase information.
    pub sequential: bool,
    /// Ignition end times are refined on individual teeth.
    pub per_tooth_ignition: bool,
    /// Re-align the primary tooth counter on every cam tooth.
    pub resync_on_secondary: bool,
    /// Cam angle at which the secondary reference edge is expected.
    pub cam_reference_angle: i16,
    pub max_rpm: u16,
    pub cranking_rpm: u16,
    /// Revolutions to see before trusting per-tooth cranking RPM.
    pub stable_cycles: u8,
}

impl TriggerConfig {
    /// Configuration for a crank-speed missing-tooth wheel with default limits.
    #[must_use]
    pub const fn missing_tooth(teeth: u16, missing_teeth: u8, trigger_angle: i16) -> Self {
        Self {
            pattern: TriggerPattern::MissingTooth,
            teeth,
            missing_teeth,
            trigger_angle,
            speed: WheelSpeed::Crank,
            secondary: SecondaryPattern::Single,
            primary_edge: EdgeTrigger::Rising,
            secondary_edge: EdgeTrigger::Rising,
            tertiary_edge: EdgeTrigger::Rising,
            filter: FilterLevel::Off,
            cylinders: 4,
            strokes: Strokes::Four,
            sequential: false,
            per_tooth_ignition: false,
            resync_on_secondary: false,
            cam_reference_angle: 0,
            max_rpm: DEFAULT_MAX_RPM,
            cranking_rpm: DEFAULT_CRANKING_RPM,
            stable_cycles: 1,
        }
    }

    /// Configuration for any pattern, starting from the missing-tooth defaults.
    #[must_use]
    pub const fn for_pattern(pattern: TriggerPattern, teeth: u16, trigger_angle: i16) -> Self {
        let mut config = Self::missing_tooth(teeth, 0, trigger_angle);
        config.pattern = pattern;
        config
    }

    #[must_use]
    pub const fn with_sequential(mut self, sequential: bool) -> Self {
        self.sequential = sequential;
        self
    }

    #[must_use]
    pub const fn with_speed(mut self, speed: WheelSpeed) -> Self {
        self.speed = speed;
        self
    }

    #[must_use]
    pub const fn with_filter(mut self, filter: FilterLevel) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub const fn with_cylinders(mut self, cylinders: u8) -> Self {
        self.cylinders = cylinders;
        self
    }

    #[must_use]
    pub const fn with_secondary(mut self, secondary: SecondaryPattern) -> Self {
        self.secondary = secondary;
        self
    }

    #[must_use]
    pub const fn with_per_tooth_ignition(mut self, enabled: bool) -> Self {
        self.per_tooth_ignition = enabled;
        self
    }

    /// Length of one ignition/injection cycle in degrees.
    #[must_use]
    pub const fn cycle_angle(&self) -> u16 {
        if self.sequential && matches!(self.strokes, Strokes::Four) {
            crate::timing::DEGREES_PER_CYCLE
        } else {
            crate::timing::DEGREES_PER_REVOLUTION
        }
    }

    /// Degrees swept by one turn of the primary wheel.
    #[must_use]
    pub const fn wheel_angle(&self) -> u16 {
        match self.speed {
            WheelSpeed::Crank => crate::timing::DEGREES_PER_REVOLUTION,
            WheelSpeed::Cam => crate::timing::DEGREES_PER_CYCLE,
        }
    }

    /// Checks the geometry for combinations no decoder can work with.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cylinders == 0 || usize::from(self.cylinders) > MAX_CHANNELS {
            return Err(ConfigError::UnsupportedCylinderCount(self.cylinders));
        }
        if self.max_rpm == 0 {
            return Err(ConfigError::ZeroMaxRpm);
        }

        match self.pattern {
            TriggerPattern::MissingTooth => {
                if self.teeth < 2 {
                    return Err(ConfigError::TooFewTeeth(self.teeth));
                }
                if self.missing_teeth == 0 || u16::from(self.missing_teeth) >= self.teeth / 2 {
                    return Err(ConfigError::InvalidMissingTeeth {
                        teeth: self.teeth,
                        missing: self.missing_teeth,
                    });
                }
                if self.wheel_angle() % self.teeth != 0 {
                    return Err(ConfigError::UnevenToothAngle(self.teeth));
                }
            }
            TriggerPattern::DualWheel => {
                if self.teeth == 0 {
                    return Err(ConfigError::TooFewTeeth(self.teeth));
                }
                if self.wheel_angle() % self.teeth != 0 {
                    return Err(ConfigError::UnevenToothAngle(self.teeth));
                }
            }
            TriggerPattern::BasicDistributor => {
                if 720 % u16::from(self.cylinders) != 0 {
                    return Err(ConfigError::UnsupportedCylinderCount(self.cylinders));
                }
            }
            TriggerPattern::Daihatsu => {
                if !matches!(self.cylinders, 3 | 4) {
                    return Err(ConfigError::UnsupportedCylinderCount(self.cylinders));
                }
            }
            TriggerPattern::Audi135
            | TriggerPattern::Gm7x
            | TriggerPattern::HondaD17
            | TriggerPattern::Miata9905
            | TriggerPattern::ThirtySixMinusTwoMinusOne => {}
        }

        Ok(())
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self::missing_tooth(36, 1, 0)
    }
}

/// Reasons a [`TriggerConfig`] is rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    TooFewTeeth(u16),
    InvalidMissingTeeth { teeth: u16, missing: u8 },
    UnevenToothAngle(u16),
    UnsupportedCylinderCount(u8),
    ZeroMaxRpm,
    /// More output channels requested than the core (or the board) provides.
    TooManyChannels(u8),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::TooFewTeeth(teeth) => write!(f, "wheel needs more than {teeth} teeth"),
            ConfigError::InvalidMissingTeeth { teeth, missing } => {
                write!(f, "{missing} missing teeth is invalid for a {teeth} tooth wheel")
            }
            ConfigError::UnevenToothAngle(teeth) => {
                write!(f, "{teeth} teeth do not divide 360 degrees evenly")
            }
            ConfigError::UnsupportedCylinderCount(count) => {
                write!(f, "unsupported cylinder count {count}")
            }
            ConfigError::ZeroMaxRpm => f.write_str("maximum RPM must be non-zero"),
            ConfigError::TooManyChannels(count) => write!(f, "{count} output channels exceed the limit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_a_valid_36_minus_1() {
        let config = TriggerConfig::default();
        assert_eq!(config.pattern, TriggerPattern::MissingTooth);
        assert_eq!(config.teeth, 36);
        assert_eq!(config.missing_teeth, 1);
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.cycle_angle(), 360);
        assert_eq!(config.with_sequential(true).cycle_angle(), 720);
    }

    #[test]
    fn validate_rejects_broken_geometry() {
        assert_eq!(
            TriggerConfig::missing_tooth(36, 0, 0).validate(),
            Err(ConfigError::InvalidMissingTeeth {
                teeth: 36,
                missing: 0
            })
        );
        assert_eq!(
            TriggerConfig::missing_tooth(7, 1, 0).validate(),
            Err(ConfigError::UnevenToothAngle(7))
        );
        assert_eq!(
            TriggerConfig::default().with_cylinders(0).validate(),
            Err(ConfigError::UnsupportedCylinderCount(0))
        );
    }

    #[test]
    fn filter_thresholds_scale_with_gap() {
        assert_eq!(FilterLevel::Off.threshold(1_000), 0);
        assert_eq!(FilterLevel::Lite.threshold(1_000), 250);
        assert_eq!(FilterLevel::Medium.threshold(1_000), 500);
        assert_eq!(FilterLevel::Aggressive.threshold(1_000), 750);
    }
}
