use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;

use crate::common::register_bus::RegisterBus;

/// Settle time between power sequencing steps
pub const SMC_STEP_DELAY_MS: u32 = 50;

/// Drives the SMC debug-enable and reset lines to hand the flash bus back and forth
/// between the console and this device.
pub struct SmcSequencer<P: OutputPin, D: DelayNs> {
    debug_enable: P,
    reset: P,
    delay: D,
}

impl<P: OutputPin, D: DelayNs> SmcSequencer<P, D> {
    /// Take the lines and park them released (high)
    pub fn new(mut debug_enable: P, mut reset: P, delay: D) -> Self {
        let _ = debug_enable.set_high();
        let _ = reset.set_high();
        Self {
            debug_enable,
            reset,
            delay,
        }
    }

    /// Let the console boot: release the bus and pulse reset
    pub async fn start<B: RegisterBus>(&mut self, bus: &mut B) {
        info!("SMC start");
        bus.deinit();

        let _ = self.debug_enable.set_low();
        let _ = self.reset.set_low();
        self.delay.delay_ms(SMC_STEP_DELAY_MS).await;
        let _ = self.reset.set_high();
    }

    /// Halt the console in debug mode and take the bus
    pub async fn stop<B: RegisterBus>(&mut self, bus: &mut B) {
        info!("SMC stop");
        let _ = self.debug_enable.set_low();
        self.delay.delay_ms(SMC_STEP_DELAY_MS).await;

        bus.set_chip_select(true);
        let _ = self.reset.set_low();
        self.delay.delay_ms(SMC_STEP_DELAY_MS).await;

        let _ = self.debug_enable.set_high();
        let _ = self.reset.set_high();
        self.delay.delay_ms(SMC_STEP_DELAY_MS).await;

        bus.set_chip_select(false);
        self.delay.delay_ms(SMC_STEP_DELAY_MS).await;

        bus.init();
    }
}
