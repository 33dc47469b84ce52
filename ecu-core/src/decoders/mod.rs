//! Trigger decoders: tooth-pattern recognition, sync tracking and crank angle.
//!
//! Every supported wheel is a zero-sized type implementing [`Pattern`], the
//! contract the engine relies on: setup, one handler per sensor input, RPM,
//! crank angle, end-tooth calculation and stall time. [`TriggerDecoder`] owns the
//! mutable [`DecoderState`] and routes calls to the configured pattern with a
//! single `match`, so switching wheels never allocates.
//!
//! Edge handlers run in interrupt context. They never block and report errors
//! purely as state: filtered edges are dropped, inconsistent tooth counts clear
//! sync and bump the sync-loss counter.

mod distributor;
mod dual_wheel;
mod gm;
mod honda;
mod mazda;
mod missing_tooth;
mod multi_gap;
mod shared;

use core::fmt;

use crate::Micros;
use crate::config::{ConfigError, MAX_CHANNELS, SecondaryPattern, TriggerConfig, WheelSpeed};
use crate::timing::{
    RevolutionTiming, revolution_time_from_tooth_gap, rpm_from_revolution_time, wrap_angle,
};

pub use shared::SharedDecoder;

/// Runs `$body` with `$p` aliased to the pattern type for `$pattern`.
macro_rules! dispatch {
    ($pattern:expr, $p:ident => $body:expr) => {
        match $pattern {
            $crate::decoders::TriggerPattern::MissingTooth => {
                type $p = $crate::decoders::missing_tooth::MissingTooth;
                $body
            }
            $crate::decoders::TriggerPattern::BasicDistributor => {
                type $p = $crate::decoders::distributor::BasicDistributor;
                $body
            }
            $crate::decoders::TriggerPattern::DualWheel => {
                type $p = $crate::decoders::dual_wheel::DualWheel;
                $body
            }
            $crate::decoders::TriggerPattern::Audi135 => {
                type $p = $crate::decoders::dual_wheel::Audi135;
                $body
            }
            $crate::decoders::TriggerPattern::Gm7x => {
                type $p = $crate::decoders::gm::Gm7x;
                $body
            }
            $crate::decoders::TriggerPattern::HondaD17 => {
                type $p = $crate::decoders::honda::HondaD17;
                $body
            }
            $crate::decoders::TriggerPattern::Daihatsu => {
                type $p = $crate::decoders::distributor::Daihatsu;
                $body
            }
            $crate::decoders::TriggerPattern::Miata9905 => {
                type $p = $crate::decoders::mazda::Miata9905;
                $body
            }
            $crate::decoders::TriggerPattern::ThirtySixMinusTwoMinusOne => {
                type $p = $crate::decoders::multi_gap::ThirtySixMinusTwoMinusOne;
                $body
            }
        }
    };
}

/// Microseconds per crank degree at 50 RPM, rounded up so a 50 RPM gap stays
/// inside the stall limit.
pub(crate) const STALL_MICROS_PER_DEGREE: u32 = 3_334;

/// Wheel layouts understood by the decoder family.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TriggerPattern {
    MissingTooth,
    BasicDistributor,
    DualWheel,
    Audi135,
    Gm7x,
    HondaD17,
    Daihatsu,
    Miata9905,
    ThirtySixMinusTwoMinusOne,
}

impl TriggerPattern {
    pub const ALL: [TriggerPattern; 9] = [
        TriggerPattern::MissingTooth,
        TriggerPattern::BasicDistributor,
        TriggerPattern::DualWheel,
        TriggerPattern::Audi135,
        TriggerPattern::Gm7x,
        TriggerPattern::HondaD17,
        TriggerPattern::Daihatsu,
        TriggerPattern::Miata9905,
        TriggerPattern::ThirtySixMinusTwoMinusOne,
    ];

    /// Short lowercase identifier used by tooling.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            TriggerPattern::MissingTooth => "missing-tooth",
            TriggerPattern::BasicDistributor => "distributor",
            TriggerPattern::DualWheel => "dual-wheel",
            TriggerPattern::Audi135 => "audi-135",
            TriggerPattern::Gm7x => "gm-7x",
            TriggerPattern::HondaD17 => "honda-d17",
            TriggerPattern::Daihatsu => "daihatsu",
            TriggerPattern::Miata9905 => "miata-99-05",
            TriggerPattern::ThirtySixMinusTwoMinusOne => "36-2-1",
        }
    }

    /// Looks a pattern up by its [`name`](Self::name).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|pattern| pattern.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for TriggerPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How much of the engine position the decoder currently knows.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SyncStatus {
    /// No reference seen; the tooth counter is meaningless.
    #[default]
    None,
    /// Crank position known, cam phase (which revolution) not yet confirmed.
    Half,
    /// Full engine-cycle position known.
    Full,
}

impl SyncStatus {
    /// Returns `true` for both half and full sync.
    #[must_use]
    pub const fn is_synced(self) -> bool {
        !matches!(self, SyncStatus::None)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SyncStatus::None => "none",
            SyncStatus::Half => "half",
            SyncStatus::Full => "full",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static layout of the primary wheel derived from configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct WheelGeometry {
    /// Nominal angle between consecutive tooth positions (crank degrees).
    pub tooth_angle: u16,
    /// Tooth positions counted per wheel turn before the counter wraps.
    pub actual_teeth: u16,
    /// Absolute angle of every tooth for unevenly spaced wheels, indexed by tooth - 1.
    pub tooth_angles: &'static [i16],
    /// Wheel supports re-targeting ignition end times on individual teeth.
    pub per_tooth: bool,
}

impl WheelGeometry {
    pub(crate) const fn even(tooth_angle: u16, actual_teeth: u16, per_tooth: bool) -> Self {
        Self {
            tooth_angle,
            actual_teeth,
            tooth_angles: &[],
            per_tooth,
        }
    }

    pub(crate) const fn table(tooth_angle: u16, tooth_angles: &'static [i16]) -> Self {
        // Tables hold at most a handful of entries.
        #[allow(clippy::cast_possible_truncation)]
        let actual_teeth = tooth_angles.len() as u16;
        Self {
            tooth_angle,
            actual_teeth,
            tooth_angles,
            per_tooth: false,
        }
    }

    /// Table angle for `tooth`, or `None` for evenly spaced wheels and tooth 0.
    #[must_use]
    pub fn table_angle(&self, tooth: u16) -> Option<i16> {
        let index = usize::from(tooth.checked_sub(1)?);
        self.tooth_angles.get(index).copied()
    }

    /// Angle swept between the previous tooth and `tooth` on a table wheel.
    #[must_use]
    pub fn table_spacing(&self, tooth: u16) -> Option<u16> {
        let current = self.table_angle(tooth)?;
        let previous = if tooth == 1 {
            self.table_angle(self.actual_teeth)?
        } else {
            self.table_angle(tooth - 1)?
        };
        u16::try_from(wrap_angle(
            i32::from(current) - i32::from(previous),
            crate::timing::DEGREES_PER_CYCLE,
        ))
        .ok()
    }
}

/// Tooth reached on an edge that may carry a per-tooth ignition correction.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ToothEvent {
    /// Tooth number within the ignition cycle (second revolution offset by the wheel size).
    pub tooth: u16,
    /// Crank angle of that tooth, wrapped to the ignition cycle.
    pub crank_angle: i16,
}

/// Outcome of one primary edge.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct EdgeReport {
    /// Edge passed the noise filter.
    pub accepted: bool,
    /// Present when the edge landed on a tooth eligible for per-tooth timing.
    pub per_tooth: Option<ToothEvent>,
}

impl EdgeReport {
    pub(crate) const fn filtered() -> Self {
        Self {
            accepted: false,
            per_tooth: None,
        }
    }

    pub(crate) const fn accepted() -> Self {
        Self {
            accepted: true,
            per_tooth: None,
        }
    }

    pub(crate) const fn tooth(event: Option<ToothEvent>) -> Self {
        Self {
            accepted: true,
            per_tooth: event,
        }
    }
}

/// Mutable state shared by every pattern implementation.
///
/// Written only from the edge handlers (and `rpm`, which caches the revolution
/// time); everything else reads a [`ToothLog`] snapshot.
#[derive(Copy, Clone, Debug)]
pub struct DecoderState {
    pub(crate) config: TriggerConfig,
    pub(crate) geometry: WheelGeometry,
    pub(crate) tooth_current_count: u16,
    pub(crate) tooth_last_time: Micros,
    pub(crate) tooth_last_minus_one_time: Micros,
    pub(crate) primary_edges: u8,
    pub(crate) tooth_one_time: Micros,
    pub(crate) tooth_one_minus_one_time: Micros,
    pub(crate) tooth_one_edges: u8,
    /// Raw edge time for wheels that decimate or skip teeth.
    pub(crate) system_last_time: Micros,
    /// Pattern-private counter (decimation phase).
    pub(crate) system_count: u8,
    pub(crate) secondary_last_time: Micros,
    pub(crate) secondary_last_minus_one_time: Micros,
    pub(crate) secondary_count: u16,
    pub(crate) tertiary_last_time: Micros,
    pub(crate) revolution_one: bool,
    pub(crate) sync: SyncStatus,
    pub(crate) sync_loss_count: u16,
    pub(crate) start_revolutions: u16,
    pub(crate) filter_time: Micros,
    pub(crate) secondary_filter_time: Micros,
    pub(crate) tertiary_filter_time: Micros,
    pub(crate) timing: RevolutionTiming,
    pub(crate) rpm: u16,
    pub(crate) vvt1_angle: i16,
    pub(crate) vvt2_angle: i16,
    pub(crate) end_teeth: [u16; MAX_CHANNELS],
}

impl DecoderState {
    fn new(config: TriggerConfig, geometry: WheelGeometry) -> Self {
        Self {
            config,
            geometry,
            tooth_current_count: 0,
            tooth_last_time: 0,
            tooth_last_minus_one_time: 0,
            primary_edges: 0,
            tooth_one_time: 0,
            tooth_one_minus_one_time: 0,
            tooth_one_edges: 0,
            system_last_time: 0,
            system_count: 0,
            secondary_last_time: 0,
            secondary_last_minus_one_time: 0,
            secondary_count: 0,
            tertiary_last_time: 0,
            revolution_one: false,
            sync: SyncStatus::None,
            sync_loss_count: 0,
            start_revolutions: 0,
            filter_time: 0,
            secondary_filter_time: 0,
            tertiary_filter_time: 0,
            timing: RevolutionTiming::new(),
            rpm: 0,
            vvt1_angle: 0,
            vvt2_angle: 0,
            end_teeth: [0; MAX_CHANNELS],
        }
    }

    pub(crate) fn primary_gap(&self, now: Micros) -> Micros {
        now.wrapping_sub(self.tooth_last_time)
    }

    /// At least two primary teeth recorded, so [`last_tooth_gap`](Self::last_tooth_gap) is real.
    pub(crate) fn has_gap_history(&self) -> bool {
        self.primary_edges >= 2
    }

    /// Time between the two most recently recorded primary teeth.
    pub(crate) fn last_tooth_gap(&self) -> Micros {
        self.tooth_last_time.wrapping_sub(self.tooth_last_minus_one_time)
    }

    pub(crate) fn record_tooth(&mut self, now: Micros) {
        self.tooth_last_minus_one_time = self.tooth_last_time;
        self.tooth_last_time = now;
        self.primary_edges = self.primary_edges.saturating_add(1);
    }

    pub(crate) fn mark_tooth_one(&mut self, now: Micros) {
        self.tooth_one_minus_one_time = self.tooth_one_time;
        self.tooth_one_time = now;
        self.tooth_one_edges = self.tooth_one_edges.saturating_add(1);
    }

    pub(crate) fn record_secondary(&mut self, now: Micros) {
        self.secondary_last_minus_one_time = self.secondary_last_time;
        self.secondary_last_time = now;
    }

    pub(crate) fn set_filter(&mut self, gap: Micros) {
        self.filter_time = self.config.filter.threshold(gap);
    }

    pub(crate) fn bump_start_revolutions(&mut self) {
        self.start_revolutions = self.start_revolutions.saturating_add(1);
    }

    pub(crate) fn count_sync_loss(&mut self) {
        self.sync_loss_count = self.sync_loss_count.wrapping_add(1);
    }

    /// Drops to no sync. Only a decoder that actually had sync counts a loss.
    pub(crate) fn lose_sync(&mut self) {
        if self.sync.is_synced() {
            self.count_sync_loss();
        }
        self.sync = SyncStatus::None;
        self.start_revolutions = 0;
        self.tooth_one_edges = 0;
    }

    /// Sync decision taken on a reference gap.
    ///
    /// Sequential operation on a crank-speed wheel needs the cam input before
    /// the revolution parity can be trusted; until then the decoder stays at
    /// half sync.
    pub(crate) fn declare_reference_sync(&mut self) {
        if !self.config.sequential {
            self.sync = SyncStatus::Full;
            return;
        }

        if self.secondary_count > 0 || self.config.speed == WheelSpeed::Cam {
            self.sync = SyncStatus::Full;
            if self.config.secondary == SecondaryPattern::Single {
                self.secondary_count = 0;
            }
        } else if self.sync != SyncStatus::Full {
            self.sync = SyncStatus::Half;
        }
    }

    fn commit_revolution_time(&mut self, revolution_time: Micros) -> u16 {
        self.timing.set_revolution_time(revolution_time);
        rpm_from_revolution_time(revolution_time, self.config.max_rpm)
    }

    /// RPM from the time between the two most recent tooth-one events.
    pub(crate) fn std_rpm(&mut self, cam_speed: bool) -> u16 {
        if !self.sync.is_synced() || self.tooth_one_edges < 2 {
            return 0;
        }
        let mut revolution_time = self.tooth_one_time.wrapping_sub(self.tooth_one_minus_one_time);
        if cam_speed {
            revolution_time /= 2;
        }
        self.commit_revolution_time(revolution_time)
    }

    /// Cranking RPM from the latest tooth gap on an evenly spaced wheel.
    pub(crate) fn cranking_rpm(&mut self, teeth_per_wheel: u16, cam_speed: bool) -> u16 {
        if !self.sync.is_synced()
            || self.start_revolutions < u16::from(self.config.stable_cycles)
            || !self.has_gap_history()
        {
            return 0;
        }
        let gap = self.last_tooth_gap();
        if gap == 0 {
            return 0;
        }
        let mut revolution_time = revolution_time_from_tooth_gap(gap, teeth_per_wheel);
        if cam_speed {
            revolution_time /= 2;
        }
        self.commit_revolution_time(revolution_time)
    }

    /// Cranking RPM from the latest tooth gap and the angle it spans.
    pub(crate) fn cranking_rpm_for_angle(&mut self, gap_angle: u16) -> u16 {
        if !self.sync.is_synced() || !self.has_gap_history() || gap_angle == 0 {
            return 0;
        }
        let scaled = u64::from(self.last_tooth_gap()) * u64::from(crate::timing::DEGREES_PER_REVOLUTION)
            / u64::from(gap_angle);
        let revolution_time = u32::try_from(scaled).unwrap_or(u32::MAX);
        self.commit_revolution_time(revolution_time)
    }

    /// Per-tooth event for the current tooth of an evenly spaced crank wheel.
    pub(crate) fn even_tooth_event(&self) -> Option<ToothEvent> {
        if !self.config.per_tooth_ignition || !self.sync.is_synced() {
            return None;
        }
        let mut tooth = self.tooth_current_count;
        let mut angle = (i32::from(tooth) - 1) * i32::from(self.geometry.tooth_angle)
            + i32::from(self.config.trigger_angle);
        if self.config.sequential && self.revolution_one && self.config.speed == WheelSpeed::Crank {
            angle += i32::from(crate::timing::DEGREES_PER_REVOLUTION);
            tooth = tooth.saturating_add(self.config.teeth);
        }
        Some(ToothEvent {
            tooth,
            crank_angle: wrap_angle(angle, self.config.cycle_angle()),
        })
    }

    fn snapshot(&self) -> ToothLog {
        ToothLog {
            config: self.config,
            geometry: self.geometry,
            tooth: self.tooth_current_count,
            last_tooth_time: self.tooth_last_time,
            revolution_one: self.revolution_one,
            sync: self.sync,
            timing: self.timing,
        }
    }
}

/// Consistent copy of the state needed to compute the crank angle.
///
/// Taken inside a critical section; the angle maths then runs outside it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ToothLog {
    config: TriggerConfig,
    geometry: WheelGeometry,
    pub tooth: u16,
    pub last_tooth_time: Micros,
    pub revolution_one: bool,
    pub sync: SyncStatus,
    pub timing: RevolutionTiming,
}

impl ToothLog {
    /// Crank angle at `now`, wrapped into `[0, cycle)`.
    #[must_use]
    pub fn crank_angle(&self, now: Micros) -> i16 {
        dispatch!(self.config.pattern, P => P::crank_angle(self, now))
    }

    /// Angle of the last tooth on an evenly spaced wheel plus the elapsed time.
    pub(crate) fn even_angle(&self, now: Micros) -> i16 {
        let mut angle = (i32::from(self.tooth) - 1) * i32::from(self.geometry.tooth_angle)
            + i32::from(self.config.trigger_angle);
        if self.revolution_one && self.config.speed == WheelSpeed::Crank {
            angle += i32::from(crate::timing::DEGREES_PER_REVOLUTION);
        }
        self.advance_from_tooth(angle, now)
    }

    /// Angle from the wheel's tooth table plus the elapsed time; 0 before a position is known.
    pub(crate) fn table_angle(&self, now: Micros) -> i16 {
        match self.geometry.table_angle(self.tooth) {
            Some(angle) => self.advance_from_tooth(
                i32::from(angle) + i32::from(self.config.trigger_angle),
                now,
            ),
            None => 0,
        }
    }

    fn advance_from_tooth(&self, tooth_angle: i32, now: Micros) -> i16 {
        let cycle = self.config.cycle_angle();
        let elapsed = self
            .timing
            .time_to_angle(now.wrapping_sub(self.last_tooth_time))
            .min(u32::from(cycle));
        let elapsed = i32::try_from(elapsed).unwrap_or(i32::from(cycle));
        wrap_angle(tooth_angle + elapsed, cycle)
    }
}

/// Operations every wheel pattern provides.
pub(crate) trait Pattern {
    /// Wheel geometry for this configuration.
    fn geometry(config: &TriggerConfig) -> WheelGeometry;

    /// Extra initialisation beyond the zeroed [`DecoderState`].
    fn setup(state: &mut DecoderState) {
        let _ = state;
    }

    fn primary(state: &mut DecoderState, now: Micros) -> EdgeReport;

    fn secondary(state: &mut DecoderState, now: Micros) {
        let _ = (state, now);
    }

    fn tertiary(state: &mut DecoderState, now: Micros) {
        let gap = now.wrapping_sub(state.tertiary_last_time);
        if gap >= state.tertiary_filter_time {
            state.tertiary_filter_time = gap >> 1;
            state.tertiary_last_time = now;
        }
    }

    fn rpm(state: &mut DecoderState) -> u16;

    fn crank_angle(log: &ToothLog, now: Micros) -> i16 {
        log.even_angle(now)
    }

    /// Computes the per-tooth ignition end tooth for each channel end angle.
    fn set_end_teeth(state: &mut DecoderState, end_angles: &[i16]) {
        let _ = end_angles;
        state.end_teeth = [0; MAX_CHANNELS];
    }

    /// Longest primary gap tolerated before the engine counts as stopped.
    fn stall_time(state: &DecoderState) -> Micros;
}

/// The active decoder: configuration, state and dispatch to its pattern.
#[derive(Copy, Clone, Debug)]
pub struct TriggerDecoder {
    state: DecoderState,
}

impl TriggerDecoder {
    /// Validates `config` and prepares the decoder for its first edge.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] reported by [`TriggerConfig::validate`].
    pub fn new(config: TriggerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let geometry = dispatch!(config.pattern, P => P::geometry(&config));
        let mut state = DecoderState::new(config, geometry);
        dispatch!(config.pattern, P => P::setup(&mut state));
        Ok(Self { state })
    }

    #[must_use]
    pub fn config(&self) -> &TriggerConfig {
        &self.state.config
    }

    #[must_use]
    pub fn geometry(&self) -> &WheelGeometry {
        &self.state.geometry
    }

    /// Returns to the power-on state, keeping the configuration.
    ///
    /// The sync-loss counter survives so diagnostics see losses across stalls.
    pub fn reset(&mut self) {
        let sync_loss_count = self.state.sync_loss_count;
        let mut state = DecoderState::new(self.state.config, self.state.geometry);
        state.sync_loss_count = sync_loss_count;
        dispatch!(state.config.pattern, P => P::setup(&mut state));
        self.state = state;
    }

    /// Handles an edge on the primary (crank) input.
    pub fn primary_edge(&mut self, now: Micros) -> EdgeReport {
        dispatch!(self.state.config.pattern, P => P::primary(&mut self.state, now))
    }

    /// Handles an edge on the secondary (cam) input and captures the VVT1 angle.
    pub fn secondary_edge(&mut self, now: Micros) {
        dispatch!(self.state.config.pattern, P => P::secondary(&mut self.state, now));
        if self.state.sync.is_synced() {
            self.state.vvt1_angle = self.cam_angle(now);
        }
    }

    /// Handles an edge on the tertiary (second cam) input and captures the VVT2 angle.
    pub fn tertiary_edge(&mut self, now: Micros) {
        dispatch!(self.state.config.pattern, P => P::tertiary(&mut self.state, now));
        if self.state.sync.is_synced() {
            self.state.vvt2_angle = self.cam_angle(now);
        }
    }

    fn cam_angle(&self, now: Micros) -> i16 {
        let relative = i32::from(self.crank_angle(now)) - i32::from(self.state.config.cam_reference_angle);
        let wrapped = wrap_angle(relative, crate::timing::DEGREES_PER_CYCLE);
        if wrapped > 360 {
            wrapped - 720
        } else {
            wrapped
        }
    }

    /// Recomputes RPM (and the revolution time behind it) from the tooth log.
    pub fn rpm(&mut self) -> u16 {
        let rpm = dispatch!(self.state.config.pattern, P => P::rpm(&mut self.state));
        self.state.rpm = rpm;
        rpm
    }

    /// RPM from the last [`rpm`](Self::rpm) call.
    #[must_use]
    pub fn current_rpm(&self) -> u16 {
        self.state.rpm
    }

    /// Crank angle at `now`.
    #[must_use]
    pub fn crank_angle(&self, now: Micros) -> i16 {
        self.snapshot().crank_angle(now)
    }

    #[must_use]
    pub fn snapshot(&self) -> ToothLog {
        self.state.snapshot()
    }

    /// Recomputes the per-tooth end tooth for each ignition channel end angle.
    pub fn set_end_teeth(&mut self, end_angles: &[i16]) {
        if self.state.geometry.per_tooth {
            dispatch!(self.state.config.pattern, P => P::set_end_teeth(&mut self.state, end_angles));
        } else {
            self.state.end_teeth = [0; MAX_CHANNELS];
        }
    }

    /// End tooth of ignition channel `channel`, 0 when per-tooth timing is unavailable.
    #[must_use]
    pub fn end_tooth(&self, channel: usize) -> u16 {
        self.state.end_teeth.get(channel).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn end_teeth(&self) -> &[u16; MAX_CHANNELS] {
        &self.state.end_teeth
    }

    #[must_use]
    pub fn stall_time(&self) -> Micros {
        dispatch!(self.state.config.pattern, P => P::stall_time(&self.state))
    }

    /// No primary tooth for longer than [`stall_time`](Self::stall_time).
    #[must_use]
    pub fn is_stalled(&self, now: Micros) -> bool {
        self.state.primary_edges > 0
            && now.wrapping_sub(self.state.tooth_last_time) > self.stall_time()
    }

    #[must_use]
    pub fn sync_status(&self) -> SyncStatus {
        self.state.sync
    }

    #[must_use]
    pub fn has_sync(&self) -> bool {
        self.state.sync.is_synced()
    }

    #[must_use]
    pub fn sync_loss_count(&self) -> u16 {
        self.state.sync_loss_count
    }

    #[must_use]
    pub fn start_revolutions(&self) -> u16 {
        self.state.start_revolutions
    }

    #[must_use]
    pub fn tooth(&self) -> u16 {
        self.state.tooth_current_count
    }

    #[must_use]
    pub fn revolution_one(&self) -> bool {
        self.state.revolution_one
    }

    #[must_use]
    pub fn last_tooth_time(&self) -> Micros {
        self.state.tooth_last_time
    }

    #[must_use]
    pub fn timing(&self) -> &RevolutionTiming {
        &self.state.timing
    }

    #[must_use]
    pub fn revolution_time(&self) -> Micros {
        self.state.timing.revolution_time()
    }

    /// Latest cam angles (VVT1, VVT2) relative to the configured reference.
    #[must_use]
    pub fn vvt_angles(&self) -> (i16, i16) {
        (self.state.vvt1_angle, self.state.vvt2_angle)
    }

    #[must_use]
    pub fn secondary_count(&self) -> u16 {
        self.state.secondary_count
    }
}
