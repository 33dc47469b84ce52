use core::cell::RefCell;

use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, Mutex, RawRestoreState};
use defmt_rtt as _;
use ecu_core::engine::EngineCore;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Level, Output, Pull, Speed};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use crate::config::{self, FUEL_CHANNELS, IGNITION_CHANNELS};
use crate::hw::outputs::BoardOutputs;
use crate::hw::timer::TickCompare;

mod compare_task;
mod housekeeping_task;
mod log_task;
mod trigger_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) type Engine = EngineCore<TickCompare, FUEL_CHANNELS, IGNITION_CHANNELS>;

struct Board {
    engine: Engine,
    outputs: BoardOutputs,
}

static BOARD: Mutex<RefCell<Option<Board>>> = Mutex::new(RefCell::new(None));

/// Raised by housekeeping when the engine recorded new telemetry.
pub(super) static TELEMETRY_PENDING: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Runs `f` with the engine and its outputs inside a critical section.
///
/// Returns `None` until `main` has installed the board.
pub(super) fn with_board<R>(f: impl FnOnce(&mut Engine, &mut BoardOutputs) -> R) -> Option<R> {
    critical_section::with(|cs| {
        let mut board = BOARD.borrow_ref_mut(cs);
        board
            .as_mut()
            .map(|Board { engine, outputs }| f(engine, outputs))
    })
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA1,
        PA2,
        PA4,
        PA5,
        PA6,
        PA7,
        PB3,
        PB4,
        PB5,
        PB6,
        EXTI0,
        EXTI1,
        EXTI2,
        ..
    } = hal::init(config);

    let layout = match config::layout() {
        Ok(layout) => layout,
        Err(error) => defmt::panic!("engine: invalid layout: {}", defmt::Display2Format(&error)),
    };
    let engine = match Engine::new(
        config::TRIGGER,
        layout,
        core::array::from_fn(|_| TickCompare::new()),
        core::array::from_fn(|_| TickCompare::new()),
    ) {
        Ok(engine) => engine,
        Err(error) => defmt::panic!("engine: invalid trigger: {}", defmt::Display2Format(&error)),
    };

    let mut outputs = BoardOutputs::new(
        [
            Output::new(PA4, Level::Low, Speed::VeryHigh),
            Output::new(PA5, Level::Low, Speed::VeryHigh),
            Output::new(PA6, Level::Low, Speed::VeryHigh),
            Output::new(PA7, Level::Low, Speed::VeryHigh),
        ],
        [
            Output::new(PB3, Level::Low, Speed::VeryHigh),
            Output::new(PB4, Level::Low, Speed::VeryHigh),
            Output::new(PB5, Level::Low, Speed::VeryHigh),
            Output::new(PB6, Level::Low, Speed::VeryHigh),
        ],
    );
    outputs.all_off();

    critical_section::with(|cs| {
        BOARD.borrow(cs).replace(Some(Board { engine, outputs }));
    });
    defmt::info!(
        "engine: {} wheel, {} fuel / {} ignition channels",
        config::TRIGGER.pattern.name(),
        layout.fuel_channels,
        layout.ignition_channels
    );

    let crank = ExtiInput::new(PA0, EXTI0, Pull::None);
    let cam = ExtiInput::new(PA1, EXTI1, Pull::None);
    let exhaust_cam = ExtiInput::new(PA2, EXTI2, Pull::None);

    spawner
        .spawn(trigger_task::run(crank, cam, exhaust_cam))
        .expect("failed to spawn trigger task");
    spawner
        .spawn(compare_task::run())
        .expect("failed to spawn compare task");
    spawner
        .spawn(housekeeping_task::run())
        .expect("failed to spawn housekeeping task");
    spawner
        .spawn(log_task::run())
        .expect("failed to spawn log task");

    core::future::pending::<()>().await;
}
