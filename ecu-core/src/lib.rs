#![no_std]

// Shared engine-position and output-scheduling logic.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library and heap allocation. Interrupt-shared state is grouped
// into plain structs that the firmware wraps in `critical_section::Mutex`.

pub mod channels;
pub mod config;
pub mod decoders;
pub mod engine;
pub mod per_tooth;
pub mod schedule;
pub mod status;
pub mod telemetry;
pub mod timing;

/// Microsecond timestamp from the free-running system clock. Wraps after ~71 minutes.
pub type Micros = u32;
