use ecu_core::Micros;
use ecu_core::schedule::sim::{SimClock, SimTimer};
use ecu_core::schedule::{
    ChannelOutput, FuelSchedule, IgnitionSchedule, MAX_TIMER_PERIOD, OutputChannel, ScheduleStatus,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Edge {
    Begin(OutputChannel, Micros),
    End(OutputChannel, Micros),
}

/// Records output callbacks with the clock time they happened at.
struct Recorder<'a> {
    clock: &'a SimClock,
    edges: Vec<Edge>,
}

impl<'a> Recorder<'a> {
    fn new(clock: &'a SimClock) -> Self {
        Self {
            clock,
            edges: Vec::new(),
        }
    }
}

impl ChannelOutput for Recorder<'_> {
    fn begin(&mut self, channel: OutputChannel) {
        self.edges.push(Edge::Begin(channel, self.clock.now()));
    }

    fn end(&mut self, channel: OutputChannel) {
        self.edges.push(Edge::End(channel, self.clock.now()));
    }
}

fn fire_fuel(clock: &SimClock, schedule: &mut FuelSchedule<SimTimer<'_>>, output: &mut Recorder<'_>) -> Micros {
    let at = schedule.timer().next_match().unwrap();
    clock.set(at);
    schedule.on_compare(output);
    at
}

fn fire_ignition(
    clock: &SimClock,
    schedule: &mut IgnitionSchedule<SimTimer<'_>>,
    output: &mut Recorder<'_>,
) -> Micros {
    let at = schedule.timer().next_match().unwrap();
    clock.set(at);
    schedule.on_compare(output);
    at
}

#[test]
fn fuel_pulse_opens_and_closes_on_time() {
    let clock = SimClock::new(0);
    let mut output = Recorder::new(&clock);
    let mut fuel = FuelSchedule::new(0, SimTimer::new(&clock));
    let injector = OutputChannel::injector(0);

    assert!(fuel.arm(1_000, 1_000));
    assert_eq!(fuel.status(), ScheduleStatus::Pending);
    assert_eq!(fire_fuel(&clock, &mut fuel, &mut output), 1_000);
    assert_eq!(fuel.status(), ScheduleStatus::Running);
    assert_eq!(fire_fuel(&clock, &mut fuel, &mut output), 2_000);
    assert_eq!(fuel.status(), ScheduleStatus::Off);

    assert_eq!(
        output.edges,
        [Edge::Begin(injector, 1_000), Edge::End(injector, 2_000)]
    );
    assert!(!fuel.timer().is_enabled());
    assert_eq!((fuel.starts(), fuel.completions()), (1, 1));
}

#[test]
fn request_while_running_is_queued_behind_the_pulse() {
    let clock = SimClock::new(0);
    let mut output = Recorder::new(&clock);
    let mut fuel = FuelSchedule::new(1, SimTimer::new(&clock));

    fuel.arm(1_000, 1_000);
    fire_fuel(&clock, &mut fuel, &mut output);
    clock.set(1_500);
    assert!(fuel.arm(2_500, 500));
    assert!(fuel.has_next());
    assert_eq!(fuel.status(), ScheduleStatus::Running);

    assert_eq!(fire_fuel(&clock, &mut fuel, &mut output), 2_000);
    assert_eq!(fuel.status(), ScheduleStatus::Pending);
    assert!(!fuel.has_next());
    assert_eq!(fire_fuel(&clock, &mut fuel, &mut output), 4_000);
    assert_eq!(fire_fuel(&clock, &mut fuel, &mut output), 4_500);
    assert_eq!(fuel.status(), ScheduleStatus::Off);
    assert_eq!(fuel.completions(), 2);
}

#[test]
fn oversized_timeouts_clamp_or_drop() {
    let clock = SimClock::new(0);
    let mut output = Recorder::new(&clock);
    let mut fuel = FuelSchedule::new(0, SimTimer::new(&clock));

    assert!(fuel.arm(300_000, 1_000));
    assert_eq!(fuel.start_compare(), 65_534);
    assert_eq!(fuel.timer().next_match(), Some(4 * 65_534));

    fire_fuel(&clock, &mut fuel, &mut output);
    assert_eq!(fuel.status(), ScheduleStatus::Running);
    assert!(!fuel.arm(MAX_TIMER_PERIOD, 1_000));
    assert!(!fuel.has_next());
    assert!(fuel.arm(MAX_TIMER_PERIOD - 4, 1_000));
    assert!(fuel.has_next());
}

#[test]
fn disable_pending_only_cancels_what_has_not_started() {
    let clock = SimClock::new(0);
    let mut output = Recorder::new(&clock);
    let mut fuel = FuelSchedule::new(0, SimTimer::new(&clock));

    fuel.arm(1_000, 1_000);
    fuel.disable_pending();
    assert_eq!(fuel.status(), ScheduleStatus::Off);
    assert!(!fuel.timer().is_enabled());

    fuel.arm(1_000, 1_000);
    fire_fuel(&clock, &mut fuel, &mut output);
    fuel.arm(5_000, 1_000);
    fuel.disable_pending();
    assert_eq!(fuel.status(), ScheduleStatus::Running);
    assert!(!fuel.has_next());

    fire_fuel(&clock, &mut fuel, &mut output);
    assert_eq!(fuel.status(), ScheduleStatus::Off);
    assert_eq!(output.edges.len(), 2);
}

#[test]
fn preset_spark_replaces_the_dwell_end() {
    let clock = SimClock::new(0);
    let mut output = Recorder::new(&clock);
    let mut coil = IgnitionSchedule::new(0, SimTimer::new(&clock));
    let channel = OutputChannel::coil(0);

    assert!(coil.arm(1_000, 3_000));
    assert!(coil.preset_end(2_000));
    assert!(coil.end_set_by_decoder());

    // Re-arming the dwell keeps the preset spark.
    coil.arm(1_200, 3_000);
    assert_eq!(coil.end_compare(), 500);

    assert_eq!(fire_ignition(&clock, &mut coil, &mut output), 1_200);
    assert_eq!(coil.end_compare(), 500);
    assert_eq!(fire_ignition(&clock, &mut coil, &mut output), 2_000);
    assert!(!coil.end_set_by_decoder());
    assert_eq!(output.edges, [Edge::Begin(channel, 1_200), Edge::End(channel, 2_000)]);
}

#[test]
fn retarget_moves_the_spark_of_a_dwelling_coil() {
    let clock = SimClock::new(0);
    let mut output = Recorder::new(&clock);
    let mut coil = IgnitionSchedule::new(1, SimTimer::new(&clock));

    coil.arm(1_000, 3_000);
    assert!(!coil.retarget_running_end(500));
    fire_ignition(&clock, &mut coil, &mut output);
    assert_eq!(coil.timer().next_match(), Some(4_000));

    clock.set(2_500);
    assert!(coil.retarget_running_end(500));
    assert_eq!(fire_ignition(&clock, &mut coil, &mut output), 3_000);
    assert_eq!(coil.status(), ScheduleStatus::Off);
    assert!(!coil.preset_end(100));
}

#[test]
fn compares_wrap_with_the_counter() {
    let clock = SimClock::new(4 * 65_500);
    let mut output = Recorder::new(&clock);
    let mut fuel = FuelSchedule::new(0, SimTimer::new(&clock));

    fuel.arm(1_000, 1_000);
    assert_eq!(fuel.start_compare(), 214);
    assert_eq!(fire_fuel(&clock, &mut fuel, &mut output), 4 * 65_500 + 1_000);
    assert_eq!(fuel.end_compare(), 464);
    assert_eq!(fire_fuel(&clock, &mut fuel, &mut output), 4 * 65_500 + 2_000);
    assert_eq!(fuel.completions(), 1);
}

#[test]
fn force_off_ends_a_live_output() {
    let clock = SimClock::new(0);
    let mut output = Recorder::new(&clock);
    let mut coil = IgnitionSchedule::new(0, SimTimer::new(&clock));

    coil.arm(1_000, 3_000);
    fire_ignition(&clock, &mut coil, &mut output);
    clock.set(1_800);
    coil.force_off(&mut output);
    assert_eq!(coil.status(), ScheduleStatus::Off);
    assert_eq!(output.edges.last(), Some(&Edge::End(OutputChannel::coil(0), 1_800)));

    // Nothing to end when the coil never started dwelling.
    coil.arm(1_000, 3_000);
    coil.force_off(&mut output);
    assert_eq!(output.edges.len(), 2);
}

#[test]
fn queued_start_inside_the_running_pulse_follows_its_end() {
    let clock = SimClock::new(0);
    let mut output = Recorder::new(&clock);
    let mut fuel = FuelSchedule::new(0, SimTimer::new(&clock));
    let injector = OutputChannel::injector(0);

    fuel.arm(1_000, 1_000);
    fire_fuel(&clock, &mut fuel, &mut output);
    // Wants to open at 1700 while the pulse runs until 2000.
    clock.set(1_500);
    assert!(fuel.arm(200, 500));

    assert_eq!(fire_fuel(&clock, &mut fuel, &mut output), 2_000);
    assert_eq!(fuel.status(), ScheduleStatus::Pending);
    assert_eq!(fuel.timer().next_match(), Some(2_004));
    assert_eq!(fire_fuel(&clock, &mut fuel, &mut output), 2_004);
    assert_eq!(fire_fuel(&clock, &mut fuel, &mut output), 2_504);
    assert_eq!(
        output.edges[2..],
        [Edge::Begin(injector, 2_004), Edge::End(injector, 2_504)]
    );
    assert_eq!(fuel.completions(), 2);
}

#[test]
fn queued_dwell_overtaken_by_a_later_spark_starts_after_it() {
    let clock = SimClock::new(0);
    let mut output = Recorder::new(&clock);
    let mut coil = IgnitionSchedule::new(0, SimTimer::new(&clock));

    coil.arm(1_000, 3_000);
    fire_ignition(&clock, &mut coil, &mut output);
    clock.set(2_000);
    assert!(coil.arm(2_500, 1_000));

    // The spark moves from 4000 to 5000, past the queued dwell at 4500.
    clock.set(2_500);
    assert!(coil.retarget_running_end(2_500));
    assert_eq!(fire_ignition(&clock, &mut coil, &mut output), 5_000);
    assert_eq!(coil.timer().next_match(), Some(5_004));
    assert_eq!(fire_ignition(&clock, &mut coil, &mut output), 5_004);
    assert_eq!(fire_ignition(&clock, &mut coil, &mut output), 6_004);
    assert_eq!(coil.status(), ScheduleStatus::Off);
}
