//! Composition root tying the decoder to the output schedules.
//!
//! [`EngineCore`] owns one [`TriggerDecoder`], a bank of fuel and ignition
//! schedules and the angle bookkeeping for every channel. Interrupt handlers
//! call the edge and compare entry points; the main loop calls
//! [`EngineCore::update`] with the latest calibration request. The firmware
//! keeps the whole core inside a `critical_section::Mutex` so every entry
//! point sees a consistent decoder and schedule state.

use crate::Micros;
use crate::channels::{ChannelError, ChannelLayout, FuelChannel, IgnitionChannel, schedule_timeout};
use crate::config::{ConfigError, MAX_CHANNELS, TriggerConfig};
use crate::decoders::{EdgeReport, SyncStatus, TriggerDecoder};
use crate::per_tooth;
use crate::schedule::{
    ChannelOutput, CompareTimer, FuelSchedule, IgnitionSchedule, MAX_TIMER_PERIOD, ScheduleStatus,
};
use crate::status::{ChannelSample, StatusSnapshot};
use crate::telemetry::{DecoderEvent, TelemetryRecorder};

/// Calibration outputs for the current engine state.
///
/// Normally looked up from fuel and spark tables by the caller.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ScheduleRequest {
    /// Injector open time.
    pub pulse_width: Micros,
    /// Crank angle (after each channel's TDC) at which injection should end.
    pub injection_angle: u16,
    /// Spark advance, degrees before TDC.
    pub advance: i16,
    /// Coil charge time.
    pub dwell: Micros,
}

/// Decoder, schedules and channel angles for one engine.
pub struct EngineCore<T, const FUEL: usize, const IGN: usize> {
    decoder: TriggerDecoder,
    layout: ChannelLayout,
    fuel: [FuelSchedule<T>; FUEL],
    ignition: [IgnitionSchedule<T>; IGN],
    fuel_channels: [FuelChannel; FUEL],
    ignition_channels: [IgnitionChannel; IGN],
    telemetry: TelemetryRecorder,
    last_sync: SyncStatus,
    last_sync_losses: u16,
    rpm: u16,
    cranking: bool,
    end_teeth_stale: bool,
}

impl<T: CompareTimer, const FUEL: usize, const IGN: usize> EngineCore<T, FUEL, IGN> {
    /// Validates the configuration and builds the schedules on the supplied timers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the trigger configuration is invalid or the
    /// layout asks for more channels than timers were supplied.
    pub fn new(
        config: TriggerConfig,
        layout: ChannelLayout,
        fuel_timers: [T; FUEL],
        ignition_timers: [T; IGN],
    ) -> Result<Self, ConfigError> {
        layout.validate()?;
        if usize::from(layout.fuel_channels) > FUEL {
            return Err(ConfigError::TooManyChannels(layout.fuel_channels));
        }
        if usize::from(layout.ignition_channels) > IGN {
            return Err(ConfigError::TooManyChannels(layout.ignition_channels));
        }
        let decoder = TriggerDecoder::new(config)?;

        Ok(Self {
            decoder,
            layout,
            fuel: FuelSchedule::bank(fuel_timers),
            ignition: IgnitionSchedule::bank(ignition_timers),
            fuel_channels: core::array::from_fn(|index| {
                FuelChannel::new(layout.fuel_tdc.get(index).copied().unwrap_or(0))
            }),
            ignition_channels: core::array::from_fn(|index| {
                IgnitionChannel::new(layout.ignition_tdc.get(index).copied().unwrap_or(0))
            }),
            telemetry: TelemetryRecorder::new(),
            last_sync: SyncStatus::None,
            last_sync_losses: 0,
            rpm: 0,
            cranking: false,
            end_teeth_stale: true,
        })
    }

    fn active_fuel(&self) -> usize {
        usize::from(self.layout.fuel_channels).min(FUEL)
    }

    fn active_ignition(&self) -> usize {
        usize::from(self.layout.ignition_channels).min(IGN)
    }

    /// Primary (crank) edge interrupt.
    pub fn primary_edge(&mut self, now: Micros) -> EdgeReport {
        let report = self.decoder.primary_edge(now);
        if let Some(event) = report.per_tooth {
            let active = self.active_ignition();
            per_tooth::adjust_ignition(
                event,
                &self.decoder,
                &self.ignition_channels[..active],
                &mut self.ignition[..active],
                &self.layout.limits,
            );
        }
        self.note_sync(now);
        report
    }

    /// Secondary (cam) edge interrupt.
    pub fn secondary_edge(&mut self, now: Micros) {
        self.decoder.secondary_edge(now);
        self.note_sync(now);
    }

    /// Tertiary (second cam) edge interrupt.
    pub fn tertiary_edge(&mut self, now: Micros) {
        self.decoder.tertiary_edge(now);
    }

    /// Compare interrupt of injector `channel`.
    pub fn fuel_compare<O: ChannelOutput>(
        &mut self,
        channel: usize,
        output: &mut O,
    ) -> Result<ScheduleStatus, ChannelError> {
        let schedule = self
            .fuel
            .get_mut(channel)
            .ok_or(ChannelError::OutOfRange {
                index: channel,
                channels: FUEL,
            })?;
        Ok(schedule.on_compare(output))
    }

    /// Compare interrupt of coil `channel`.
    pub fn ignition_compare<O: ChannelOutput>(
        &mut self,
        channel: usize,
        output: &mut O,
    ) -> Result<ScheduleStatus, ChannelError> {
        let schedule = self
            .ignition
            .get_mut(channel)
            .ok_or(ChannelError::OutOfRange {
                index: channel,
                channels: IGN,
            })?;
        Ok(schedule.on_compare(output))
    }

    /// Fuel cut: drops a pulse on `channel` that has not started yet.
    pub fn disable_pending_fuel(&mut self, channel: usize) -> Result<(), ChannelError> {
        self.fuel
            .get_mut(channel)
            .ok_or(ChannelError::OutOfRange {
                index: channel,
                channels: FUEL,
            })?
            .disable_pending();
        Ok(())
    }

    /// Spark cut: drops a dwell on `channel` that has not started yet.
    pub fn disable_pending_ignition(&mut self, channel: usize) -> Result<(), ChannelError> {
        self.ignition
            .get_mut(channel)
            .ok_or(ChannelError::OutOfRange {
                index: channel,
                channels: IGN,
            })?
            .disable_pending();
        Ok(())
    }

    /// Main-loop housekeeping; returns the current RPM.
    ///
    /// Detects a stalled engine, refreshes RPM and the channel angles, keeps
    /// the per-tooth end teeth in step with the spark angles and, once the
    /// decoder has full sync, arms every channel whose start angle lies ahead.
    pub fn update<O: ChannelOutput>(
        &mut self,
        now: Micros,
        request: &ScheduleRequest,
        output: &mut O,
    ) -> u16 {
        if self.decoder.is_stalled(now) {
            self.stall(now, output);
            return 0;
        }

        self.rpm = self.decoder.rpm();
        self.cranking = self.rpm > 0 && self.rpm < self.decoder.config().cranking_rpm;
        self.note_sync(now);

        let timing = *self.decoder.timing();
        let limits = self.layout.limits;

        let dwell_angle = degrees(timing.time_to_angle(request.dwell), limits.ignition);
        let active = self.active_ignition();
        let mut spark_moved = false;
        for channel in &mut self.ignition_channels[..active] {
            spark_moved |= channel.update(request.advance, dwell_angle, &limits);
        }
        if spark_moved || self.end_teeth_stale {
            self.refresh_end_teeth();
        }

        let pulse_angle = degrees(timing.time_to_angle(request.pulse_width), limits.injection);
        let active = self.active_fuel();
        for channel in &mut self.fuel_channels[..active] {
            channel.update(request.injection_angle, pulse_angle, &limits);
        }

        if self.decoder.sync_status() == SyncStatus::Full && self.rpm > 0 {
            self.arm_channels(now, request);
        }

        self.rpm
    }

    fn arm_channels(&mut self, now: Micros, request: &ScheduleRequest) {
        let crank_angle = self.decoder.crank_angle(now);
        let timing = *self.decoder.timing();
        let limits = self.layout.limits;

        if request.pulse_width > 0 {
            let active = self.active_fuel();
            for (channel, schedule) in self.fuel_channels[..active]
                .iter()
                .zip(self.fuel[..active].iter_mut())
            {
                let running = schedule.status() == ScheduleStatus::Running;
                if let Some(timeout) = schedule_timeout(
                    channel.start_angle,
                    crank_angle,
                    limits.injection,
                    running,
                    &timing,
                ) && timeout < MAX_TIMER_PERIOD
                {
                    schedule.arm(timeout, request.pulse_width);
                }
            }
        }

        if request.dwell > 0 {
            let active = self.active_ignition();
            for (channel, schedule) in self.ignition_channels[..active]
                .iter()
                .zip(self.ignition[..active].iter_mut())
            {
                let running = schedule.status() == ScheduleStatus::Running;
                if let Some(timeout) = schedule_timeout(
                    channel.start_angle,
                    crank_angle,
                    limits.ignition,
                    running,
                    &timing,
                ) && timeout < MAX_TIMER_PERIOD
                {
                    schedule.arm(timeout, request.dwell);
                }
            }
        }
    }

    fn refresh_end_teeth(&mut self) {
        let active = self.active_ignition();
        let mut end_angles = [0i16; MAX_CHANNELS];
        for (slot, channel) in end_angles.iter_mut().zip(&self.ignition_channels[..active]) {
            *slot = channel.end_angle;
        }
        self.decoder.set_end_teeth(&end_angles[..active]);
        for (index, channel) in self.ignition_channels[..active].iter_mut().enumerate() {
            channel.end_tooth = self.decoder.end_tooth(index);
        }
        self.end_teeth_stale = false;
    }

    fn stall<O: ChannelOutput>(&mut self, now: Micros, output: &mut O) {
        self.telemetry.record(
            DecoderEvent::Stalled,
            now,
            self.rpm,
            self.decoder.sync_loss_count(),
        );
        self.decoder.reset();
        for schedule in &mut self.fuel {
            schedule.force_off(output);
        }
        for schedule in &mut self.ignition {
            schedule.force_off(output);
        }
        for channel in &mut self.ignition_channels {
            channel.end_tooth = 0;
        }
        self.rpm = 0;
        self.cranking = false;
        self.last_sync = SyncStatus::None;
        self.end_teeth_stale = true;
    }

    /// Records sync changes, including a loss and re-sync within the same edge.
    fn note_sync(&mut self, now: Micros) {
        let current = self.decoder.sync_status();
        let losses = self.decoder.sync_loss_count();
        if losses != self.last_sync_losses {
            self.telemetry
                .record(DecoderEvent::SyncLost, now, self.rpm, losses);
            self.telemetry
                .record_sync_transition(SyncStatus::None, current, now, self.rpm, losses);
            self.last_sync_losses = losses;
        } else {
            self.telemetry
                .record_sync_transition(self.last_sync, current, now, self.rpm, losses);
        }
        self.last_sync = current;
    }

    /// Returns the engine to its power-on state, keeping the configuration.
    pub fn reset<O: ChannelOutput>(&mut self, output: &mut O) {
        self.decoder.reset();
        for schedule in &mut self.fuel {
            schedule.force_off(output);
        }
        for schedule in &mut self.ignition {
            schedule.force_off(output);
        }
        self.rpm = 0;
        self.cranking = false;
        self.last_sync = SyncStatus::None;
        self.end_teeth_stale = true;
    }

    /// Copies the state shown by `status` commands and the logger.
    #[must_use]
    pub fn status(&self, now: Micros) -> StatusSnapshot {
        let mut snapshot = StatusSnapshot::stopped(self.decoder.config().pattern);
        snapshot.sync = self.decoder.sync_status();
        snapshot.rpm = self.rpm;
        snapshot.crank_angle = if snapshot.sync.is_synced() {
            self.decoder.crank_angle(now)
        } else {
            0
        };
        snapshot.tooth = self.decoder.tooth();
        snapshot.revolution_time = self.decoder.revolution_time();
        snapshot.sync_loss_count = self.decoder.sync_loss_count();
        snapshot.start_revolutions = self.decoder.start_revolutions();
        snapshot.cranking = self.cranking;
        snapshot.vvt = self.decoder.vvt_angles();

        for schedule in &self.fuel[..self.active_fuel()] {
            // Capacity matches MAX_CHANNELS, which bounds the layout.
            let _ = snapshot.fuel.push(ChannelSample {
                channel: schedule.channel(),
                status: schedule.status(),
                starts: schedule.starts(),
                completions: schedule.completions(),
            });
        }
        for schedule in &self.ignition[..self.active_ignition()] {
            let _ = snapshot.ignition.push(ChannelSample {
                channel: schedule.channel(),
                status: schedule.status(),
                starts: schedule.starts(),
                completions: schedule.completions(),
            });
        }
        snapshot
    }

    #[must_use]
    pub const fn decoder(&self) -> &TriggerDecoder {
        &self.decoder
    }

    #[must_use]
    pub const fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    #[must_use]
    pub const fn rpm(&self) -> u16 {
        self.rpm
    }

    #[must_use]
    pub const fn is_cranking(&self) -> bool {
        self.cranking
    }

    #[must_use]
    pub fn fuel_schedule(&self, channel: usize) -> Option<&FuelSchedule<T>> {
        self.fuel.get(channel)
    }

    #[must_use]
    pub fn ignition_schedule(&self, channel: usize) -> Option<&IgnitionSchedule<T>> {
        self.ignition.get(channel)
    }

    #[must_use]
    pub fn fuel_channel(&self, channel: usize) -> Option<&FuelChannel> {
        self.fuel_channels.get(channel)
    }

    #[must_use]
    pub fn ignition_channel(&self, channel: usize) -> Option<&IgnitionChannel> {
        self.ignition_channels.get(channel)
    }

    #[must_use]
    pub fn fuel_schedules(&self) -> &[FuelSchedule<T>] {
        &self.fuel
    }

    #[must_use]
    pub fn ignition_schedules(&self) -> &[IgnitionSchedule<T>] {
        &self.ignition
    }
}

/// Angle as a `u16` degree count, capped at one cycle.
fn degrees(angle: u32, cycle: u16) -> u16 {
    u16::try_from(angle).unwrap_or(u16::MAX).min(cycle)
}
