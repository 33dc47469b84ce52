//! Forwarding of decoder telemetry to the debug log.
//!
//! The engine core records sync transitions and stalls into its own ring.
//! [`LogCursor`] remembers how far the firmware has logged so the logger task
//! can copy fresh records out under the lock and format them afterwards.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use ecu_core::telemetry::{DecoderEvent, EventId, TelemetryRecord, TelemetryRecorder};
use heapless::Vec;

use crate::status::StatusSummary;

/// Records copied per logger wake-up.
pub const LOG_BATCH: usize = 8;

/// Batch of records waiting to be logged.
pub type LogBatch = Vec<TelemetryRecord, LOG_BATCH>;

/// Position of the logger in the telemetry stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogCursor {
    next: EventId,
}

impl LogCursor {
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Copies records the cursor has not seen yet into `batch`, oldest first.
    ///
    /// Returns how many records were overwritten in the ring before they
    /// could be copied.
    pub fn collect(&mut self, recorder: &TelemetryRecorder, batch: &mut LogBatch) -> u32 {
        let mut dropped = 0;
        for record in recorder.since(self.next) {
            if batch.is_full() {
                break;
            }
            if batch.is_empty() {
                dropped = record.id.wrapping_sub(self.next);
            }
            if batch.push(*record).is_err() {
                break;
            }
            self.next = record.id.wrapping_add(1);
        }
        dropped
    }

    /// Whether `recorder` holds records past the cursor.
    pub fn is_behind(&self, recorder: &TelemetryRecorder) -> bool {
        recorder.next_event_id() != self.next
    }
}

/// Logs one telemetry record.
pub fn log_record(record: &TelemetryRecord) {
    emit_record(
        event_label(record.event),
        is_fault(record.event),
        record.timestamp_us,
        record.rpm,
        record.sync_loss_count,
    );
}

/// Logs a note about records lost to ring overflow.
pub fn log_dropped(count: u32) {
    if count > 0 {
        emit_dropped(count);
    }
}

/// Logs the periodic engine status line.
pub fn log_status(summary: &StatusSummary) {
    emit_status(
        summary.rpm,
        summary.sync.as_str(),
        summary.crank_angle,
        summary.sync_loss_count,
        summary.cranking,
    );
}

const fn event_label(event: DecoderEvent) -> &'static str {
    match event {
        DecoderEvent::SyncAcquired => "sync-acquired",
        DecoderEvent::HalfSync => "half-sync",
        DecoderEvent::SyncLost => "sync-lost",
        DecoderEvent::Stalled => "stalled",
    }
}

const fn is_fault(event: DecoderEvent) -> bool {
    matches!(event, DecoderEvent::SyncLost | DecoderEvent::Stalled)
}

#[cfg(target_os = "none")]
fn emit_record(label: &'static str, fault: bool, timestamp_us: u32, rpm: u16, losses: u16) {
    if fault {
        defmt::warn!(
            "decoder: {} t={}us rpm={} losses={}",
            label,
            timestamp_us,
            rpm,
            losses
        );
    } else {
        defmt::info!(
            "decoder: {} t={}us rpm={} losses={}",
            label,
            timestamp_us,
            rpm,
            losses
        );
    }
}

#[cfg(not(target_os = "none"))]
fn emit_record(label: &'static str, fault: bool, timestamp_us: u32, rpm: u16, losses: u16) {
    let level = if fault { "WARN" } else { "INFO" };
    println!("{level} decoder: {label} t={timestamp_us}us rpm={rpm} losses={losses}");
}

#[cfg(target_os = "none")]
fn emit_dropped(count: u32) {
    defmt::warn!("decoder: {} telemetry records overwritten", count);
}

#[cfg(not(target_os = "none"))]
fn emit_dropped(count: u32) {
    println!("WARN decoder: {count} telemetry records overwritten");
}

#[cfg(target_os = "none")]
fn emit_status(rpm: u16, sync: &'static str, angle: i16, losses: u16, cranking: bool) {
    defmt::info!(
        "engine: rpm={} sync={} angle={} losses={} cranking={}",
        rpm,
        sync,
        angle,
        losses,
        cranking
    );
}

#[cfg(not(target_os = "none"))]
fn emit_status(rpm: u16, sync: &'static str, angle: i16, losses: u16, cranking: bool) {
    println!("INFO engine: rpm={rpm} sync={sync} angle={angle} losses={losses} cranking={cranking}");
}
