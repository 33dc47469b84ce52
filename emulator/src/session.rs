//! Simulated engine behind the REPL.
//!
//! [`Session`] owns one [`EngineCore`] running on [`SimTimer`]s, a
//! [`ToothStream`] standing in for the trigger wheel and the calibration
//! request. Running the wheel interleaves three event sources in time order:
//! compare matches, sensor edges and the 1 ms housekeeping tick.

use std::fmt::Write as _;

use ecu_core::Micros;
use ecu_core::channels::ChannelLayout;
use ecu_core::config::{ConfigError, MAX_CHANNELS, TriggerConfig};
use ecu_core::decoders::TriggerPattern;
use ecu_core::engine::{EngineCore, ScheduleRequest};
use ecu_core::schedule::sim::{SimClock, SimTimer};
use ecu_core::schedule::{ChannelOutput, OutputChannel, OutputKind};
use ecu_core::status::{StatusFormatter, StatusSnapshot};
use ecu_core::telemetry::EventId;
use ecu_core::timing::revolution_time_from_rpm;

use crate::command::{self, Command, HELP_TOPICS, RequestUpdate};
use crate::synth::{Input, ToothStream, WheelProfile};

/// Housekeeping period, matching the firmware.
pub const HOUSEKEEPING_PERIOD: Micros = 1_000;
pub const DEFAULT_RPM: u16 = 3_000;

pub const DEFAULT_REQUEST: ScheduleRequest = ScheduleRequest {
    pulse_width: 2_000,
    injection_angle: 355,
    advance: 10,
    dwell: 3_000,
};

/// Teeth used when `wheel` names a pattern without a count.
const fn default_teeth(pattern: TriggerPattern) -> (u16, u8) {
    match pattern {
        TriggerPattern::MissingTooth | TriggerPattern::ThirtySixMinusTwoMinusOne => (36, 1),
        TriggerPattern::BasicDistributor => (4, 0),
        TriggerPattern::DualWheel => (12, 0),
        TriggerPattern::Audi135 => (135, 0),
        TriggerPattern::Gm7x => (7, 0),
        TriggerPattern::HondaD17 => (13, 0),
        TriggerPattern::Daihatsu => (5, 0),
        TriggerPattern::Miata9905 => (8, 0),
    }
}

/// Trigger configuration the emulator uses for `pattern`.
pub fn wheel_config(pattern: TriggerPattern, teeth: Option<u16>, missing: Option<u8>) -> TriggerConfig {
    let (default_teeth, default_missing) = default_teeth(pattern);
    let mut config = TriggerConfig::for_pattern(pattern, teeth.unwrap_or(default_teeth), 0)
        .with_per_tooth_ignition(true);
    if pattern == TriggerPattern::MissingTooth {
        config.missing_teeth = missing.unwrap_or(default_missing);
    }
    config
}

type Engine<'c> = EngineCore<SimTimer<'c>, MAX_CHANNELS, MAX_CHANNELS>;

fn build_engine(clock: &SimClock, config: TriggerConfig) -> Result<Engine<'_>, ConfigError> {
    let layout = ChannelLayout::for_engine(&config)?;
    Engine::new(
        config,
        layout,
        core::array::from_fn(|_| SimTimer::new(clock)),
        core::array::from_fn(|_| SimTimer::new(clock)),
    )
}

/// Output edge captured from a schedule callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputEdge {
    pub channel: OutputChannel,
    pub on: bool,
    pub at: Micros,
}

/// Records schedule callbacks with the simulated time they happened at.
struct OutputLog<'c> {
    clock: &'c SimClock,
    edges: Vec<OutputEdge>,
}

impl ChannelOutput for OutputLog<'_> {
    fn begin(&mut self, channel: OutputChannel) {
        self.edges.push(OutputEdge {
            channel,
            on: true,
            at: self.clock.now(),
        });
    }

    fn end(&mut self, channel: OutputChannel) {
        self.edges.push(OutputEdge {
            channel,
            on: false,
            at: self.clock.now(),
        });
    }
}

#[derive(Clone, Copy, Debug)]
enum Step {
    Fuel(usize),
    Ignition(usize),
    Edge(Input),
    Housekeeping,
}

/// Counters gathered over one `run`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub primary_edges: u32,
    pub secondary_edges: u32,
    pub injections: u32,
    pub sparks: u32,
}

/// Emulated engine plus REPL command handling.
pub struct Session<'c> {
    clock: &'c SimClock,
    config: TriggerConfig,
    engine: Engine<'c>,
    stream: ToothStream,
    request: ScheduleRequest,
    output: OutputLog<'c>,
    next_housekeeping: Micros,
    logged_up_to: EventId,
}

impl<'c> Session<'c> {
    /// Starts a session on `pattern` at [`DEFAULT_RPM`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the default configuration for `pattern` is invalid.
    pub fn new(clock: &'c SimClock, pattern: TriggerPattern) -> Result<Self, ConfigError> {
        let config = wheel_config(pattern, None, None);
        let engine = build_engine(clock, config)?;
        let start = clock.now();
        Ok(Self {
            clock,
            config,
            engine,
            stream: ToothStream::new(WheelProfile::for_config(&config), DEFAULT_RPM, start),
            request: DEFAULT_REQUEST,
            output: OutputLog {
                clock,
                edges: Vec::new(),
            },
            next_housekeeping: start,
            logged_up_to: 0,
        })
    }

    pub const fn config(&self) -> &TriggerConfig {
        &self.config
    }

    #[cfg(test)]
    pub fn engine(&self) -> &EngineCore<SimTimer<'c>, MAX_CHANNELS, MAX_CHANNELS> {
        &self.engine
    }

    pub fn status(&self) -> StatusSnapshot {
        self.engine.status(self.clock.now())
    }

    /// Handles one REPL line and returns the response lines.
    pub fn handle_command(&mut self, line: &str) -> Vec<String> {
        let normalized = line.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Vec::new();
        }
        match command::parse(&normalized) {
            Ok(command) => self.execute(command),
            Err(error) => vec![format!("ERR syntax {error}")],
        }
    }

    fn execute(&mut self, command: Command) -> Vec<String> {
        match command {
            Command::Wheel {
                pattern,
                teeth,
                missing,
            } => self.handle_wheel(pattern, teeth, missing),
            Command::Rpm(rpm) => {
                self.stream.set_rpm(rpm);
                vec![format!("OK rpm {rpm}")]
            }
            Command::Run { revolutions, trace } => self.handle_run(revolutions, trace),
            Command::Request(update) => self.handle_request(update),
            Command::Cut { kind, channel } => self.handle_cut(kind, channel),
            Command::Stall => self.handle_stall(),
            Command::Reset => {
                self.engine.reset(&mut self.output);
                self.output.edges.clear();
                self.restart_wheel();
                vec!["OK reset".to_string()]
            }
            Command::Status => self.handle_status(),
            Command::Events => self.handle_events(),
            Command::Help(topic) => handle_help(topic.as_deref()),
        }
    }

    fn handle_wheel(
        &mut self,
        pattern: TriggerPattern,
        teeth: Option<u16>,
        missing: Option<u8>,
    ) -> Vec<String> {
        let config = wheel_config(pattern, teeth, missing);
        let engine = match build_engine(self.clock, config) {
            Ok(engine) => engine,
            Err(error) => return vec![format!("ERR config {error}")],
        };

        // Switch the old outputs off before dropping its schedules.
        self.engine.reset(&mut self.output);
        self.output.edges.clear();
        self.engine = engine;
        self.config = config;
        self.logged_up_to = 0;
        let rpm = self.stream.rpm();
        self.stream = ToothStream::new(WheelProfile::for_config(&config), rpm, self.clock.now());

        let layout = self.engine.layout();
        vec![format!(
            "OK wheel {} teeth={} missing={} fuel={} ignition={}",
            config.pattern,
            config.teeth,
            config.missing_teeth,
            layout.fuel_channels,
            layout.ignition_channels
        )]
    }

    fn handle_request(&mut self, update: RequestUpdate) -> Vec<String> {
        let request = &mut self.request;
        if let Some(pulse_width) = update.pulse_width {
            request.pulse_width = pulse_width;
        }
        if let Some(angle) = update.injection_angle {
            request.injection_angle = angle;
        }
        if let Some(advance) = update.advance {
            request.advance = advance;
        }
        if let Some(dwell) = update.dwell {
            request.dwell = dwell;
        }
        vec![format!(
            "OK request pw={}us angle={} advance={} dwell={}us",
            request.pulse_width, request.injection_angle, request.advance, request.dwell
        )]
    }

    fn handle_cut(&mut self, kind: OutputKind, channel: usize) -> Vec<String> {
        let index = channel - 1;
        let layout = self.engine.layout();
        let active = match kind {
            OutputKind::Injector => layout.fuel_channels,
            OutputKind::Coil => layout.ignition_channels,
        };
        if index >= usize::from(active) {
            return vec![format!("ERR cut channel {channel} not in use ({active} active)")];
        }
        let result = match kind {
            OutputKind::Injector => self.engine.disable_pending_fuel(index),
            OutputKind::Coil => self.engine.disable_pending_ignition(index),
        };
        match result {
            Ok(()) => vec![format!("OK cut {}", output_channel(kind, index))],
            Err(error) => vec![format!("ERR cut {error}")],
        }
    }

    fn handle_stall(&mut self) -> Vec<String> {
        let rpm = self.stream.rpm();
        self.stream.set_rpm(0);
        self.stream.restart(self.clock.now());
        let last = self.engine.decoder().last_tooth_time();
        let stalled_at = last
            .wrapping_add(self.engine.decoder().stall_time())
            .wrapping_add(HOUSEKEEPING_PERIOD)
            .max(self.clock.now());
        let mut lines = Vec::new();
        self.advance_to(stalled_at, false, &mut lines);
        self.stream.set_rpm(rpm);
        self.restart_wheel();
        self.drain_telemetry(&mut lines);
        lines.push(format!(
            "OK stalled t={}us rpm={}",
            self.clock.now(),
            self.engine.rpm()
        ));
        lines
    }

    fn handle_run(&mut self, revolutions: u32, trace: bool) -> Vec<String> {
        let rpm = self.stream.rpm();
        if rpm == 0 {
            return vec!["ERR run wheel is stopped; set `rpm` first".to_string()];
        }
        let duration = revolution_time_from_rpm(rpm).saturating_mul(revolutions);
        let end = self.clock.now().wrapping_add(duration);

        let mut lines = Vec::new();
        let summary = self.advance_to(end, trace, &mut lines);
        self.drain_telemetry(&mut lines);

        let status = self.status();
        lines.push(format!(
            "OK run {revolutions} rev in {duration}us edges={}/{} injections={} sparks={} rpm={} sync={} angle={}",
            summary.primary_edges,
            summary.secondary_edges,
            summary.injections,
            summary.sparks,
            status.rpm,
            status.sync,
            status.crank_angle
        ));
        lines
    }

    fn handle_status(&self) -> Vec<String> {
        let snapshot = self.status();
        let formatter = StatusFormatter::new(&snapshot);
        let mut lines = Vec::new();
        for line in 0..4 {
            let mut text = String::new();
            let written = match line {
                0 => formatter.write_decoder_line(&mut text),
                1 => formatter.write_engine_line(&mut text),
                2 => formatter.write_fuel_line(&mut text),
                _ => formatter.write_ignition_line(&mut text),
            };
            if written.is_ok() && !text.is_empty() {
                lines.push(text);
            }
        }
        lines.push(format!(
            "request pw={}us angle={} advance={} dwell={}us wheel-rpm={}",
            self.request.pulse_width,
            self.request.injection_angle,
            self.request.advance,
            self.request.dwell,
            self.stream.rpm()
        ));
        lines
    }

    fn handle_events(&self) -> Vec<String> {
        let telemetry = self.engine.telemetry();
        if telemetry.is_empty() {
            return vec!["events none".to_string()];
        }
        telemetry
            .oldest_first()
            .map(|record| format!("decoder: {record}"))
            .collect()
    }

    fn restart_wheel(&mut self) {
        let now = self.clock.now();
        self.stream.restart(now);
        self.next_housekeeping = now;
    }

    fn drain_telemetry(&mut self, lines: &mut Vec<String>) {
        let telemetry = self.engine.telemetry();
        for record in telemetry.since(self.logged_up_to) {
            lines.push(format!("decoder: {record}"));
        }
        self.logged_up_to = telemetry.next_event_id();
    }

    fn next_compare(&self) -> Option<(Micros, Step)> {
        let fuel = self
            .engine
            .fuel_schedules()
            .iter()
            .enumerate()
            .filter_map(|(index, schedule)| Some((schedule.timer().next_match()?, Step::Fuel(index))));
        let ignition = self
            .engine
            .ignition_schedules()
            .iter()
            .enumerate()
            .filter_map(|(index, schedule)| {
                Some((schedule.timer().next_match()?, Step::Ignition(index)))
            });
        fuel.chain(ignition).min_by_key(|(at, _)| *at)
    }

    /// Earliest pending event at or before `end`; compares win ties, then edges.
    fn next_step(&mut self, end: Micros) -> Option<(Micros, Step)> {
        let edge = self.stream.peek().map(|edge| (edge.at, Step::Edge(edge.input)));
        let housekeeping = Some((self.next_housekeeping, Step::Housekeeping));
        [self.next_compare(), edge, housekeeping]
            .into_iter()
            .flatten()
            .filter(|(at, _)| *at <= end)
            .enumerate()
            .min_by_key(|(priority, (at, _))| (*at, *priority))
            .map(|(_, step)| step)
    }

    /// Runs every event up to `end`, appending trace lines when `trace` is set.
    fn advance_to(&mut self, end: Micros, trace: bool, lines: &mut Vec<String>) -> RunSummary {
        let mut summary = RunSummary::default();
        while let Some((at, step)) = self.next_step(end) {
            let now = at.max(self.clock.now());
            self.clock.set(now);
            match step {
                Step::Fuel(index) => {
                    if let Err(error) = self.engine.fuel_compare(index, &mut self.output) {
                        lines.push(format!("ERR schedule {error}"));
                    }
                }
                Step::Ignition(index) => {
                    if let Err(error) = self.engine.ignition_compare(index, &mut self.output) {
                        lines.push(format!("ERR schedule {error}"));
                    }
                }
                Step::Edge(input) => {
                    let _ = self.stream.pop();
                    match input {
                        Input::Primary => {
                            summary.primary_edges += 1;
                            let report = self.engine.primary_edge(now);
                            if trace {
                                let decoder = self.engine.decoder();
                                lines.push(format!(
                                    "decoder: t={now}us tooth={} angle={} sync={}{}",
                                    decoder.tooth(),
                                    decoder.crank_angle(now),
                                    decoder.sync_status(),
                                    if report.accepted { "" } else { " filtered" }
                                ));
                            }
                        }
                        Input::Secondary => {
                            summary.secondary_edges += 1;
                            self.engine.secondary_edge(now);
                            if trace {
                                lines.push(format!(
                                    "decoder: t={now}us cam sync={}",
                                    self.engine.decoder().sync_status()
                                ));
                            }
                        }
                    }
                }
                Step::Housekeeping => {
                    self.engine.update(now, &self.request, &mut self.output);
                    self.next_housekeeping = now.wrapping_add(HOUSEKEEPING_PERIOD);
                }
            }
            self.flush_outputs(trace, &mut summary, lines);
        }
        self.clock.set(end.max(self.clock.now()));
        summary
    }

    fn flush_outputs(&mut self, trace: bool, summary: &mut RunSummary, lines: &mut Vec<String>) {
        for edge in self.output.edges.drain(..) {
            match (edge.channel.kind, edge.on) {
                (OutputKind::Injector, true) => summary.injections += 1,
                (OutputKind::Coil, false) => summary.sparks += 1,
                _ => {}
            }
            if trace {
                let action = match (edge.channel.kind, edge.on) {
                    (OutputKind::Injector, true) => "open",
                    (OutputKind::Injector, false) => "close",
                    (OutputKind::Coil, true) => "dwell",
                    (OutputKind::Coil, false) => "spark",
                };
                let mut line = String::new();
                let _ = write!(
                    line,
                    "schedule: {} {action} t={}us angle={}",
                    edge.channel,
                    edge.at,
                    self.engine.decoder().crank_angle(edge.at)
                );
                lines.push(line);
            }
        }
    }
}

fn output_channel(kind: OutputKind, index: usize) -> OutputChannel {
    let index = u8::try_from(index).unwrap_or(u8::MAX);
    match kind {
        OutputKind::Injector => OutputChannel::injector(index),
        OutputKind::Coil => OutputChannel::coil(index),
    }
}

fn handle_help(topic: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    match topic {
        Some(target) => {
            if let Some((_, detail)) = HELP_TOPICS.iter().find(|(name, _)| *name == target) {
                lines.push((*detail).to_string());
            } else {
                lines.push(format!("No help available for `{target}`."));
                let topics: Vec<&str> = HELP_TOPICS.iter().map(|(name, _)| *name).collect();
                lines.push(format!("Available topics: {}", topics.join(", ")));
            }
        }
        None => {
            lines.push("Available commands:".to_string());
            for (_, detail) in HELP_TOPICS {
                lines.push(format!("  {detail}"));
            }
            let patterns: Vec<&str> = TriggerPattern::ALL.iter().map(|pattern| pattern.name()).collect();
            lines.push(format!("Wheels: {}", patterns.join(", ")));
        }
    }
    lines
}
