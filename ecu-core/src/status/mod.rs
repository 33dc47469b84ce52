//! Shared status surface for the firmware logger and the emulator REPL.
//!
//! [`StatusSnapshot`] is a plain copy of everything worth showing about the
//! engine at one instant; [`StatusFormatter`] keeps the textual rendering
//! consistent across front-ends.

use core::fmt;

use heapless::Vec;

use crate::Micros;
use crate::config::MAX_CHANNELS;
use crate::decoders::{SyncStatus, TriggerPattern};
use crate::schedule::{OutputChannel, ScheduleStatus};

/// State of one output schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelSample {
    pub channel: OutputChannel,
    pub status: ScheduleStatus,
    pub starts: u32,
    pub completions: u32,
}

/// Snapshot of decoder and scheduler state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub pattern: TriggerPattern,
    pub sync: SyncStatus,
    pub rpm: u16,
    pub crank_angle: i16,
    pub tooth: u16,
    pub revolution_time: Micros,
    pub sync_loss_count: u16,
    pub start_revolutions: u16,
    pub cranking: bool,
    /// Cam angles relative to their reference, degrees.
    pub vvt: (i16, i16),
    pub fuel: Vec<ChannelSample, MAX_CHANNELS>,
    pub ignition: Vec<ChannelSample, MAX_CHANNELS>,
}

impl StatusSnapshot {
    /// Snapshot of a stopped engine with no channels.
    #[must_use]
    pub const fn stopped(pattern: TriggerPattern) -> Self {
        Self {
            pattern,
            sync: SyncStatus::None,
            rpm: 0,
            crank_angle: 0,
            tooth: 0,
            revolution_time: 0,
            sync_loss_count: 0,
            start_revolutions: 0,
            cranking: false,
            vvt: (0, 0),
            fuel: Vec::new(),
            ignition: Vec::new(),
        }
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.rpm > 0 && !self.cranking
    }
}

/// Helper that renders a [`StatusSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the decoder line (e.g. `decoder missing-tooth sync=full tooth=12 losses=0 revs=40`).
    pub fn write_decoder_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let snapshot = self.snapshot;
        write!(
            writer,
            "decoder {} sync={} tooth={} losses={} revs={}",
            snapshot.pattern,
            snapshot.sync,
            snapshot.tooth,
            snapshot.sync_loss_count,
            snapshot.start_revolutions
        )
    }

    /// Writes the engine line (e.g. `engine rpm=3000 state=running angle=123 rev=20000us vvt=0/0`).
    pub fn write_engine_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let snapshot = self.snapshot;
        let state = if snapshot.rpm == 0 {
            "stopped"
        } else if snapshot.cranking {
            "cranking"
        } else {
            "running"
        };
        write!(
            writer,
            "engine rpm={} state={} angle={} rev=",
            snapshot.rpm, state, snapshot.crank_angle
        )?;
        if snapshot.revolution_time == 0 {
            writer.write_str("n/a")?;
        } else {
            write!(writer, "{}us", snapshot.revolution_time)?;
        }
        write!(writer, " vvt={}/{}", snapshot.vvt.0, snapshot.vvt.1)
    }

    /// Writes the fuel line (e.g. `fuel inj1=pending:12/11 inj2=off:12/12`).
    pub fn write_fuel_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("fuel")?;
        write_channels(writer, &self.snapshot.fuel)
    }

    /// Writes the ignition line (e.g. `ignition ign1=running:40/39`).
    pub fn write_ignition_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("ignition")?;
        write_channels(writer, &self.snapshot.ignition)
    }
}

fn write_channels<W: fmt::Write>(writer: &mut W, samples: &[ChannelSample]) -> fmt::Result {
    if samples.is_empty() {
        return writer.write_str(" none");
    }
    for sample in samples {
        write!(
            writer,
            " {}={}:{}/{}",
            sample.channel, sample.status, sample.starts, sample.completions
        )?;
    }
    Ok(())
}
