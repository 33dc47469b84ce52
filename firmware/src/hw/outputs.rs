//! Injector and coil drivers.

use ecu_core::schedule::{ChannelOutput, OutputChannel, OutputKind};
use embassy_stm32::gpio::Output;

use crate::config::{FUEL_CHANNELS, IGNITION_CHANNELS};

/// Push-pull outputs for every injector and coil on the board.
///
/// High opens an injector or charges a coil; the falling edge on a coil
/// output is the spark.
pub struct BoardOutputs {
    injectors: [Output<'static>; FUEL_CHANNELS],
    coils: [Output<'static>; IGNITION_CHANNELS],
}

impl BoardOutputs {
    pub fn new(
        injectors: [Output<'static>; FUEL_CHANNELS],
        coils: [Output<'static>; IGNITION_CHANNELS],
    ) -> Self {
        Self { injectors, coils }
    }

    fn pin(&mut self, channel: OutputChannel) -> Option<&mut Output<'static>> {
        let index = usize::from(channel.index);
        match channel.kind {
            OutputKind::Injector => self.injectors.get_mut(index),
            OutputKind::Coil => self.coils.get_mut(index),
        }
    }

    /// Drives every output low.
    pub fn all_off(&mut self) {
        for pin in self.injectors.iter_mut().chain(self.coils.iter_mut()) {
            pin.set_low();
        }
    }
}

impl ChannelOutput for BoardOutputs {
    fn begin(&mut self, channel: OutputChannel) {
        if let Some(pin) = self.pin(channel) {
            pin.set_high();
        }
    }

    fn end(&mut self, channel: OutputChannel) {
        if let Some(pin) = self.pin(channel) {
            pin.set_low();
        }
    }
}
