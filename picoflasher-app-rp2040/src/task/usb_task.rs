use embassy_futures::join::{join, join3};
use embassy_futures::yield_now;
use embassy_rp::gpio::Input;
use embassy_rp::peripherals::USB;
use embassy_rp::usb::Driver;
use embassy_time::Timer;
use embassy_usb::class::cdc_acm::{CdcAcmClass, State};
use embassy_usb::{Builder, Config};
use picoflasher_core::host::dispatcher::CommandDispatcher;
use picoflasher_core::host::stream::PumpOutcome;
use picoflasher_core::host::transport::BootControl;

use crate::post::sampler::PostSampler;
use crate::shared::constant::*;
use crate::shared::resource::WORK_CHANNEL;
use crate::usb::cdc::{rx_loop, tx_loop, UsbLifecycle, UsbSerialPort};

/// Re-enters the RP2040 ROM USB bootloader
struct RomBoot;

impl BootControl for RomBoot {
    fn reboot_to_bootloader(&mut self) -> ! {
        // SAFETY: ROM routine, does not return
        unsafe { embassy_rp::rom_data::reset_to_usb_boot(0, 0) };
        loop {
            cortex_m::asm::nop();
        }
    }
}

/// Create USB Config
fn create_usb_config<'a>() -> Config<'a> {
    let mut config = Config::new(USB_VID, USB_PID);
    config.manufacturer = Some(USB_MANUFACTURER);
    config.product = Some(USB_PRODUCT);
    config.serial_number = Some(USB_SERIAL_NUMBER);
    config.max_power = USB_MAX_POWER;
    config.max_packet_size_0 = USB_MAX_PACKET_SIZE as u8;

    // CDC ACM needs the IAD for Windows
    config.device_class = 0xEF;
    config.device_sub_class = 0x02;
    config.device_protocol = 0x01;
    config.composite_with_iads = true;
    config
}

/// Frame dispatch, stream pump and POST sampling, one step at a time
async fn host_loop(mut post: PostSampler<Input<'static>>) {
    let mut dispatcher = CommandDispatcher::new(&WORK_CHANNEL);
    let mut port = UsbSerialPort::new();
    let mut boot = RomBoot;

    loop {
        post.poll(dispatcher.post_log_mut());
        if dispatcher.poll_frame(&mut port, &mut boot).await {
            continue;
        }
        match dispatcher.pump_stream(&mut port).await {
            PumpOutcome::Running => yield_now().await,
            PumpOutcome::Aborted { status } => {
                crate::warn!("stream aborted with {:#x}", status)
            }
            PumpOutcome::Idle | PumpOutcome::Stalled | PumpOutcome::Finished => {
                Timer::after_micros(HOST_IDLE_POLL_US).await
            }
        }
    }
}

#[embassy_executor::task]
pub async fn main_task(driver: Driver<'static, USB>, post: PostSampler<Input<'static>>) {
    let mut config_descriptor = [0; 256];
    let mut bos_descriptor = [0; 256];
    let mut msos_descriptor = [0; 256];
    let mut control_buf = [0; 64];

    let mut state = State::new();
    let mut lifecycle = UsbLifecycle;
    let mut builder = Builder::new(
        driver,
        create_usb_config(),
        &mut config_descriptor,
        &mut bos_descriptor,
        &mut msos_descriptor,
        &mut control_buf,
    );
    builder.handler(&mut lifecycle);
    let class = CdcAcmClass::new(&mut builder, &mut state, USB_MAX_PACKET_SIZE as u16);
    let (sender, receiver) = class.split();

    let mut usb = builder.build();
    crate::info!("USB ready");

    join(
        usb.run(),
        join3(rx_loop(receiver), tx_loop(sender), host_loop(post)),
    )
    .await;
}
