use ecu_core::config::EdgeTrigger;
use embassy_futures::join::join3;
use embassy_stm32::exti::ExtiInput;

use super::with_board;
use crate::config::TRIGGER;
use crate::hw::timer::micros_now;

async fn next_edge(input: &mut ExtiInput<'static>, edge: EdgeTrigger) {
    match edge {
        EdgeTrigger::Rising => input.wait_for_rising_edge().await,
        EdgeTrigger::Falling => input.wait_for_falling_edge().await,
        EdgeTrigger::Both => input.wait_for_any_edge().await,
    }
}

/// Timestamps crank and both cam inputs and feeds them to the decoder.
#[embassy_executor::task]
pub async fn run(
    mut crank: ExtiInput<'static>,
    mut cam: ExtiInput<'static>,
    mut exhaust_cam: ExtiInput<'static>,
) -> ! {
    let primary = async {
        loop {
            next_edge(&mut crank, TRIGGER.primary_edge).await;
            let now = micros_now();
            with_board(|engine, _| engine.primary_edge(now));
        }
    };

    let secondary = async {
        loop {
            next_edge(&mut cam, TRIGGER.secondary_edge).await;
            let now = micros_now();
            with_board(|engine, _| engine.secondary_edge(now));
        }
    };

    let tertiary = async {
        loop {
            next_edge(&mut exhaust_cam, TRIGGER.tertiary_edge).await;
            let now = micros_now();
            with_board(|engine, _| engine.tertiary_edge(now));
        }
    };

    join3(primary, secondary, tertiary).await;
    loop {
        core::future::pending::<()>().await;
    }
}
