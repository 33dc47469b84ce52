use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Ticker};

use super::{TELEMETRY_PENDING, with_board};
use crate::config::STATUS_LOG_PERIOD_MS;
use crate::status;
use crate::telemetry::{self, LogBatch, LogCursor};

fn drain(cursor: &mut LogCursor) {
    loop {
        let mut batch = LogBatch::new();
        let copied = with_board(|engine, _| {
            let dropped = cursor.collect(engine.telemetry(), &mut batch);
            (dropped, cursor.is_behind(engine.telemetry()))
        });
        let Some((dropped, behind)) = copied else {
            return;
        };

        telemetry::log_dropped(dropped);
        for record in &batch {
            telemetry::log_record(record);
        }
        if !behind {
            return;
        }
    }
}

/// Logs decoder telemetry as it arrives plus a periodic status line.
#[embassy_executor::task]
pub async fn run() -> ! {
    let mut cursor = LogCursor::new();
    let mut ticker = Ticker::every(Duration::from_millis(STATUS_LOG_PERIOD_MS));

    loop {
        match select(TELEMETRY_PENDING.wait(), ticker.next()).await {
            Either::First(()) => drain(&mut cursor),
            Either::Second(()) => telemetry::log_status(&status::summary()),
        }
    }
}
