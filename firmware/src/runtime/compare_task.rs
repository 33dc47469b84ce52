use embassy_futures::select::{Either, select};
use embassy_time::{Instant, Timer};

use super::{Engine, with_board};
use crate::hw::outputs::BoardOutputs;
use crate::hw::timer::COMPARE_CHANGED;

fn next_deadline(engine: &Engine) -> Option<Instant> {
    let fuel = engine
        .fuel_schedules()
        .iter()
        .filter_map(|schedule| schedule.timer().deadline());
    let ignition = engine
        .ignition_schedules()
        .iter()
        .filter_map(|schedule| schedule.timer().deadline());
    fuel.chain(ignition).min()
}

fn fire_due(engine: &mut Engine, outputs: &mut BoardOutputs, now: Instant) {
    for index in 0..engine.fuel_schedules().len() {
        if engine.fuel_schedules()[index].timer().is_due(now)
            && let Err(error) = engine.fuel_compare(index, outputs)
        {
            defmt::warn!("schedule: {}", defmt::Display2Format(&error));
        }
    }
    for index in 0..engine.ignition_schedules().len() {
        if engine.ignition_schedules()[index].timer().is_due(now)
            && let Err(error) = engine.ignition_compare(index, outputs)
        {
            defmt::warn!("schedule: {}", defmt::Display2Format(&error));
        }
    }
}

/// Sleeps until the earliest armed compare and runs its schedule handler.
#[embassy_executor::task]
pub async fn run() -> ! {
    loop {
        let deadline = with_board(|engine, _| next_deadline(engine)).flatten();
        match deadline {
            Some(at) => {
                if let Either::First(()) = select(Timer::at(at), COMPARE_CHANGED.wait()).await {
                    let now = Instant::now();
                    with_board(|engine, outputs| fire_due(engine, outputs, now));
                }
            }
            None => COMPARE_CHANGED.wait().await,
        }
    }
}
