use ecu_core::Micros;
use ecu_core::channels::IgnitionChannel;
use ecu_core::config::TriggerConfig;
use ecu_core::decoders::TriggerDecoder;
use ecu_core::per_tooth::adjust_ignition;
use ecu_core::schedule::sim::{SimClock, SimTimer};
use ecu_core::schedule::{ChannelOutput, IgnitionSchedule, OutputChannel, ScheduleStatus};
use ecu_core::timing::CycleLimits;

const REVOLUTION: Micros = 20_000;
const START: Micros = 5_000;
const SPARK_ANGLE: i16 = 350;

fn tooth_time(revolution: u32, position: u32) -> Micros {
    START + revolution * REVOLUTION + position * REVOLUTION / 36
}

fn spark_time(revolution: u32) -> Micros {
    START + revolution * REVOLUTION + REVOLUTION * 350 / 360
}

struct Sparks<'a> {
    clock: &'a SimClock,
    times: Vec<Micros>,
}

impl ChannelOutput for Sparks<'_> {
    fn begin(&mut self, _channel: OutputChannel) {}

    fn end(&mut self, _channel: OutputChannel) {
        self.times.push(self.clock.now());
    }
}

/// A 36-1 wheel at 3000 RPM driving one coil whose spark is at 350 degrees.
struct Bench<'a> {
    clock: &'a SimClock,
    decoder: TriggerDecoder,
    channels: [IgnitionChannel; 1],
    coils: [IgnitionSchedule<SimTimer<'a>>; 1],
    sparks: Sparks<'a>,
    adjusted: usize,
}

impl<'a> Bench<'a> {
    fn new(clock: &'a SimClock) -> Self {
        let config = TriggerConfig::default().with_per_tooth_ignition(true);
        let mut decoder = TriggerDecoder::new(config).unwrap();
        decoder.set_end_teeth(&[SPARK_ANGLE]);
        let channel = IgnitionChannel {
            end_angle: SPARK_ANGLE,
            end_tooth: decoder.end_tooth(0),
            ..IgnitionChannel::new(0)
        };
        Self {
            clock,
            decoder,
            channels: [channel],
            coils: [IgnitionSchedule::new(0, SimTimer::new(clock))],
            sparks: Sparks {
                clock,
                times: Vec::new(),
            },
            adjusted: 0,
        }
    }

    fn run_until(&mut self, now: Micros) {
        loop {
            match self.coils[0].timer().next_match() {
                Some(at) if at <= now => {
                    self.clock.set(at);
                    self.coils[0].on_compare(&mut self.sparks);
                }
                _ => break,
            }
        }
        self.clock.set(now);
    }

    fn tooth(&mut self, revolution: u32, position: u32) {
        let now = tooth_time(revolution, position);
        self.run_until(now);
        let report = self.decoder.primary_edge(now);
        self.decoder.rpm();
        if let Some(event) = report.per_tooth {
            self.adjusted += adjust_ignition(
                event,
                &self.decoder,
                &self.channels,
                &mut self.coils,
                &CycleLimits::default(),
            );
        }
    }

    fn revolutions(&mut self, count: u32) {
        for revolution in 0..count {
            for position in 0..35 {
                self.tooth(revolution, position);
            }
        }
    }

    /// Arms the dwell `angle` degrees ahead of the current tooth.
    fn arm(&mut self, angle: u16, dwell: Micros) -> Micros {
        let timeout = self.decoder.timing().angle_to_time(angle);
        self.coils[0].arm(timeout, dwell);
        self.coils[0].timer().next_match().unwrap()
    }

    fn fire(&mut self) -> Micros {
        let at = self.coils[0].timer().next_match().unwrap();
        self.run_until(at);
        at
    }
}

#[test]
fn end_tooth_is_the_last_tooth_before_the_spark() {
    let clock = SimClock::new(0);
    let bench = Bench::new(&clock);
    assert_eq!(bench.channels[0].end_tooth, 35);
}

#[test]
fn dwelling_coil_sparks_from_the_end_tooth() {
    let clock = SimClock::new(0);
    let mut bench = Bench::new(&clock);
    bench.revolutions(3);
    assert_eq!(bench.decoder.revolution_time(), REVOLUTION);

    for position in 0..30 {
        bench.tooth(3, position);
    }
    // Dwell from 296 degrees with a deliberately long dwell time; the end
    // tooth pulls the spark back to 350.
    bench.arm(6, 4_000);
    for position in 30..35 {
        bench.tooth(3, position);
    }
    assert_eq!(bench.coils[0].status(), ScheduleStatus::Running);
    assert_eq!(bench.adjusted, 1);

    let spark = bench.fire();
    assert!(spark.abs_diff(spark_time(3)) <= 8, "spark at {spark}");
    assert_eq!(bench.sparks.times, [spark]);
}

#[test]
fn pending_coil_gets_a_preset_spark_once_stable() {
    let clock = SimClock::new(0);
    let mut bench = Bench::new(&clock);
    bench.revolutions(8);
    for position in 0..34 {
        bench.tooth(8, position);
    }
    assert!(bench.decoder.start_revolutions() > 6);
    // Dwell starts at 345 degrees, after the end tooth has passed.
    bench.arm(15, 4_000);
    bench.tooth(8, 34);
    assert_eq!(bench.coils[0].status(), ScheduleStatus::Pending);
    assert!(bench.coils[0].end_set_by_decoder());
    assert_eq!(bench.adjusted, 1);

    bench.fire();
    assert_eq!(bench.coils[0].status(), ScheduleStatus::Running);
    let spark = bench.fire();
    assert!(spark.abs_diff(spark_time(8)) <= 8, "spark at {spark}");
    assert!(!bench.coils[0].end_set_by_decoder());
}

#[test]
fn pending_coil_keeps_its_dwell_before_the_engine_is_stable() {
    let clock = SimClock::new(0);
    let mut bench = Bench::new(&clock);
    bench.revolutions(3);

    for position in 0..34 {
        bench.tooth(3, position);
    }
    let start = bench.arm(15, 4_000);
    bench.tooth(3, 34);
    assert_eq!(bench.adjusted, 0);
    assert!(!bench.coils[0].end_set_by_decoder());

    assert_eq!(bench.fire(), start);
    assert_eq!(bench.fire(), start + 4_000);
}
