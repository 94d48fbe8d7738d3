use embassy_rp::gpio::Output;
use embassy_time::{Delay, Instant};
use picoflasher_core::common::register_bus::TimeSource;
use picoflasher_core::emmc::engine::EmmcEngine;
use picoflasher_core::smc::sequencer::SmcSequencer;
use picoflasher_core::work::worker::StorageWorker;

use crate::shared::resource::WORK_CHANNEL;
use crate::spiex::driver::SpiexBus;

/// Uptime clock for eMMC timeouts
struct EmbassyClock;

impl TimeSource for EmbassyClock {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }
}

/// Storage worker, sole user of the spiex bus and SMC lines
#[embassy_executor::task]
pub async fn storage_worker_task(
    bus: SpiexBus<'static>,
    debug_enable: Output<'static>,
    reset: Output<'static>,
) {
    let mut worker = StorageWorker::new(
        &WORK_CHANNEL,
        bus,
        EmmcEngine::new(EmbassyClock),
        SmcSequencer::new(debug_enable, reset, Delay),
    );
    worker.run().await;
}
