#![no_std]
#![no_main]

mod post;
mod shared;
mod spiex;
mod task;
mod usb;

use defmt::*;
use embassy_executor::{Executor, Spawner};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::multicore::{spawn_core1, Stack};
use embassy_rp::peripherals::USB;
use embassy_rp::spi::{self, Spi};
use embassy_rp::usb::{Driver, InterruptHandler};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::post::sampler::PostSampler;
use crate::shared::constant::*;
use crate::spiex::driver::SpiexBus;

bind_interrupts!(struct Irqs {
    USBCTRL_IRQ => InterruptHandler<USB>;
});

static mut CORE1_STACK: Stack<CORE1_STACK_SIZE> = Stack::new();
static EXECUTOR1: StaticCell<Executor> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("picoflasher v{}", picoflasher_core::host::dispatcher::FIRMWARE_VERSION);
    let p = embassy_rp::init(Default::default());

    // SMC control and chip select idle high
    let debug_enable = Output::new(p.PIN_4, Level::High);
    let reset = Output::new(p.PIN_5, Level::High);
    let ss_n = Output::new(p.PIN_1, Level::High);

    let mut spi_config = spi::Config::default();
    spi_config.frequency = SPIEX_FREQUENCY_HZ;
    // CLK GP2, MOSI GP3, MISO GP0
    let spi = Spi::new_blocking(p.SPI0, p.PIN_2, p.PIN_3, p.PIN_0, spi_config);
    let bus = SpiexBus::new(spi, ss_n, [2, 3, 0]);

    spawn_core1(
        p.CORE1,
        unsafe { &mut *core::ptr::addr_of_mut!(CORE1_STACK) },
        move || {
            let executor1 = EXECUTOR1.init(Executor::new());
            executor1.run(|spawner| {
                unwrap!(spawner.spawn(task::storage_task::storage_worker_task(
                    bus,
                    debug_enable,
                    reset
                )))
            });
        },
    );

    // POST bus GP8..GP15, CPU reset GP7
    let post = PostSampler::new(
        [
            Input::new(p.PIN_8, Pull::Up),
            Input::new(p.PIN_9, Pull::Up),
            Input::new(p.PIN_10, Pull::Up),
            Input::new(p.PIN_11, Pull::Up),
            Input::new(p.PIN_12, Pull::Up),
            Input::new(p.PIN_13, Pull::Up),
            Input::new(p.PIN_14, Pull::Up),
            Input::new(p.PIN_15, Pull::Up),
        ],
        Input::new(p.PIN_7, Pull::None),
    );

    let driver = Driver::new(p.USB, Irqs);
    unwrap!(spawner.spawn(task::usb_task::main_task(driver, post)));
}
