//! Engine and board configuration baked into the firmware image.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use ecu_core::channels::ChannelLayout;
use ecu_core::config::{ConfigError, FilterLevel, TriggerConfig};
use ecu_core::engine::ScheduleRequest;

/// Injector outputs wired on the board.
pub const FUEL_CHANNELS: usize = 4;
/// Coil outputs wired on the board.
pub const IGNITION_CHANNELS: usize = 4;

/// 36-1 crank wheel, single cam tooth, four cylinders, wasted spark.
pub const TRIGGER: TriggerConfig = TriggerConfig::missing_tooth(36, 1, 0)
    .with_filter(FilterLevel::Lite)
    .with_per_tooth_ignition(true);

/// Calibration handed to the engine core on every housekeeping tick.
pub const BASE_REQUEST: ScheduleRequest = ScheduleRequest {
    pulse_width: 2_500,
    injection_angle: 355,
    advance: 12,
    dwell: 3_000,
};

/// Housekeeping period in microseconds.
pub const HOUSEKEEPING_PERIOD_US: u64 = 1_000;

/// Period of the engine status log line in milliseconds.
pub const STATUS_LOG_PERIOD_MS: u64 = 500;

/// Channel layout for [`TRIGGER`].
///
/// # Errors
///
/// Propagates [`ConfigError`] when the engine cannot be laid out on the board.
pub fn layout() -> Result<ChannelLayout, ConfigError> {
    let layout = ChannelLayout::for_engine(&TRIGGER)?;
    if usize::from(layout.fuel_channels) > FUEL_CHANNELS {
        return Err(ConfigError::TooManyChannels(layout.fuel_channels));
    }
    if usize::from(layout.ignition_channels) > IGNITION_CHANNELS {
        return Err(ConfigError::TooManyChannels(layout.ignition_channels));
    }
    Ok(layout)
}
