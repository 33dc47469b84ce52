//! Synthetic trigger wheels.
//!
//! A [`WheelProfile`] lists where every primary and secondary edge of a wheel
//! falls within one 720 degree engine cycle. [`ToothStream`] turns a profile
//! into timestamped edges at the current engine speed, one cycle at a time, so
//! speed changes take effect at the next cycle boundary.

use std::collections::VecDeque;

use ecu_core::Micros;
use ecu_core::config::TriggerConfig;
use ecu_core::decoders::TriggerPattern;
use ecu_core::timing::revolution_time_from_rpm;

/// Millidegrees in one four-stroke cycle.
const CYCLE_MDEG: u32 = 720_000;
const REVOLUTION_MDEG: u32 = 360_000;

/// Sensor input an edge arrives on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Input {
    Primary,
    Secondary,
}

/// One synthesised sensor edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    pub at: Micros,
    pub input: Input,
}

/// Edge positions of a wheel over one engine cycle, in millidegrees.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WheelProfile {
    edges: Vec<(u32, Input)>,
}

impl WheelProfile {
    /// Physical wheel matching `config`, with tooth 1 at the trigger angle.
    pub fn for_config(config: &TriggerConfig) -> Self {
        let mut profile = Self { edges: Vec::new() };
        match config.pattern {
            TriggerPattern::MissingTooth => {
                let wheel = u32::from(config.wheel_angle()) * 1_000;
                let teeth = u32::from(config.teeth.max(1));
                let present = teeth.saturating_sub(u32::from(config.missing_teeth));
                for turn in 0..CYCLE_MDEG / wheel {
                    profile.primary((0..present).map(|tooth| turn * wheel + tooth * wheel / teeth));
                }
                // Cam tooth part way through the first revolution.
                profile.secondary([200_000]);
            }
            TriggerPattern::BasicDistributor => {
                let teeth = u32::from(config.cylinders.max(1));
                profile.primary((0..teeth).map(|tooth| tooth * CYCLE_MDEG / teeth));
            }
            TriggerPattern::DualWheel => {
                let teeth = u32::from(config.teeth.max(1));
                let spacing = REVOLUTION_MDEG / teeth;
                profile.primary_every_revolution(&(0..teeth).map(|tooth| tooth * spacing).collect::<Vec<_>>());
                // Half a tooth ahead of tooth 1.
                profile.secondary([CYCLE_MDEG - spacing / 2]);
            }
            TriggerPattern::Audi135 => {
                let raw = 135;
                profile.primary_every_revolution(
                    &(0..raw).map(|tooth| tooth * REVOLUTION_MDEG / raw).collect::<Vec<_>>(),
                );
                profile.secondary([CYCLE_MDEG - REVOLUTION_MDEG * 5 / (2 * raw)]);
            }
            TriggerPattern::Gm7x => {
                profile.primary_every_revolution(&degrees(&[42, 102, 112, 162, 222, 282, 342]));
            }
            TriggerPattern::HondaD17 => {
                let mut angles: Vec<u32> = (0..12).map(|tooth| tooth * 30).collect();
                angles.push(335);
                profile.primary_every_revolution(&degrees(&angles));
            }
            TriggerPattern::Daihatsu => {
                let angles: &[u32] = if config.cylinders == 3 {
                    &[0, 30, 240, 480]
                } else {
                    &[0, 30, 180, 360, 540]
                };
                profile.primary(degrees(angles));
            }
            TriggerPattern::Miata9905 => {
                profile.primary(degrees(&[100, 170, 280, 350, 460, 530, 640, 710]));
                profile.secondary(degrees(&[370, 380]));
            }
            TriggerPattern::ThirtySixMinusTwoMinusOne => {
                let present = (1..=36u32).filter(|position| !matches!(position, 18 | 35 | 36));
                profile.primary_every_revolution(
                    &degrees(&present.map(|position| (position - 1) * 10).collect::<Vec<_>>()),
                );
            }
        }
        let offset = i32::from(config.trigger_angle) * 1_000;
        for (angle, _) in &mut profile.edges {
            *angle = shift(*angle, offset);
        }
        profile.edges.sort_by_key(|(angle, _)| *angle);
        profile
    }

    fn primary(&mut self, angles: impl IntoIterator<Item = u32>) {
        self.edges
            .extend(angles.into_iter().map(|angle| (angle, Input::Primary)));
    }

    fn primary_every_revolution(&mut self, angles: &[u32]) {
        for turn in [0, REVOLUTION_MDEG] {
            self.primary(angles.iter().map(|angle| turn + angle));
        }
    }

    fn secondary(&mut self, angles: impl IntoIterator<Item = u32>) {
        self.edges
            .extend(angles.into_iter().map(|angle| (angle, Input::Secondary)));
    }

    /// Primary edges per cycle.
    pub fn primary_teeth(&self) -> usize {
        self.edges
            .iter()
            .filter(|(_, input)| *input == Input::Primary)
            .count()
    }

    /// Edge positions over one cycle, in millidegrees.
    pub fn edges(&self) -> &[(u32, Input)] {
        &self.edges
    }
}

fn degrees(angles: &[u32]) -> Vec<u32> {
    angles.iter().map(|angle| angle * 1_000).collect()
}

fn shift(angle: u32, offset: i32) -> u32 {
    let shifted = i64::from(angle) + i64::from(offset);
    let wrapped = shifted.rem_euclid(i64::from(CYCLE_MDEG));
    u32::try_from(wrapped).unwrap_or(0)
}

/// Continuous stream of edges for a wheel spinning at a set speed.
#[derive(Debug)]
pub struct ToothStream {
    profile: WheelProfile,
    rpm: u16,
    next_cycle: Micros,
    pending: VecDeque<Edge>,
}

impl ToothStream {
    pub fn new(profile: WheelProfile, rpm: u16, start: Micros) -> Self {
        Self {
            profile,
            rpm,
            next_cycle: start,
            pending: VecDeque::new(),
        }
    }

    pub const fn rpm(&self) -> u16 {
        self.rpm
    }

    /// Changes speed from the next cycle on; zero stops the wheel.
    pub fn set_rpm(&mut self, rpm: u16) {
        self.rpm = rpm;
    }

    /// Drops queued edges and starts a fresh cycle at `start`.
    pub fn restart(&mut self, start: Micros) {
        self.pending.clear();
        self.next_cycle = start;
    }

    fn fill(&mut self) {
        if !self.pending.is_empty() || self.rpm == 0 {
            return;
        }
        let cycle = u64::from(revolution_time_from_rpm(self.rpm)) * 2;
        let start = self.next_cycle;
        for &(angle, input) in self.profile.edges() {
            let offset = u64::from(angle) * cycle / u64::from(CYCLE_MDEG);
            let offset = Micros::try_from(offset).unwrap_or(Micros::MAX);
            self.pending.push_back(Edge {
                at: start.wrapping_add(offset),
                input,
            });
        }
        let cycle = Micros::try_from(cycle).unwrap_or(Micros::MAX);
        self.next_cycle = start.wrapping_add(cycle);
    }

    /// Next edge without consuming it.
    pub fn peek(&mut self) -> Option<Edge> {
        self.fill();
        self.pending.front().copied()
    }

    pub fn pop(&mut self) -> Option<Edge> {
        self.fill();
        self.pending.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tooth_profile_skips_the_gap() {
        let profile = WheelProfile::for_config(&TriggerConfig::default());
        assert_eq!(profile.primary_teeth(), 70);
        let primaries: Vec<u32> = profile
            .edges()
            .iter()
            .filter(|(_, input)| *input == Input::Primary)
            .map(|(angle, _)| *angle)
            .collect();
        assert_eq!(primaries[34], 340_000);
        assert_eq!(primaries[35], 360_000);
    }

    #[test]
    fn stream_is_continuous_across_cycles() {
        let profile = WheelProfile::for_config(&TriggerConfig::default());
        let mut stream = ToothStream::new(profile, 3_000, 1_000);
        let edges: Vec<Edge> = std::iter::from_fn(|| stream.pop())
            .filter(|edge| edge.input == Input::Primary)
            .take(71)
            .collect();
        assert_eq!(edges[0].at, 1_000);
        assert_eq!(edges[1].at - edges[0].at, 555);
        // First tooth of the second cycle, 40 ms later.
        assert_eq!(edges[70].at, 41_000);
    }

    #[test]
    fn trigger_angle_rotates_the_wheel() {
        let config = TriggerConfig::missing_tooth(36, 1, 90);
        let profile = WheelProfile::for_config(&config);
        assert!(
            profile
                .edges()
                .contains(&(90_000, Input::Primary))
        );
        assert!(profile.edges().windows(2).all(|pair| pair[0].0 <= pair[1].0));
    }

    #[test]
    fn stopped_wheel_yields_nothing() {
        let profile = WheelProfile::for_config(&TriggerConfig::default());
        let mut stream = ToothStream::new(profile, 0, 0);
        assert_eq!(stream.peek(), None);
    }
}
