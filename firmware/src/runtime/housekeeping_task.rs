use embassy_time::{Duration, Ticker};

use super::{TELEMETRY_PENDING, with_board};
use crate::config::{BASE_REQUEST, HOUSEKEEPING_PERIOD_US};
use crate::hw::timer::micros_now;
use crate::status;

/// Periodic engine update: stall detection, RPM refresh and schedule arming.
#[embassy_executor::task]
pub async fn run() -> ! {
    let mut ticker = Ticker::every(Duration::from_micros(HOUSEKEEPING_PERIOD_US));
    let mut logged_up_to = 0;

    loop {
        ticker.next().await;
        let now = micros_now();
        let update = with_board(|engine, outputs| {
            engine.update(now, &BASE_REQUEST, outputs);
            (engine.status(now), engine.telemetry().next_event_id())
        });

        if let Some((snapshot, next_event)) = update {
            status::publish(&snapshot, now);
            if next_event != logged_up_to {
                logged_up_to = next_event;
                TELEMETRY_PENDING.signal(());
            }
        }
    }
}
