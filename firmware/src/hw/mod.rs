//! Board-specific glue between the STM32 peripherals and `ecu-core`.
//!
//! [`timer::TickCompare`] provides the compare channels the schedules arm and
//! [`outputs::BoardOutputs`] drives the injector and coil pins from schedule
//! callbacks.

pub mod outputs;
pub mod timer;
