/// 32-bit register access to the console's flash controller ("spiex" bus).
///
/// Every storage sequence is built from these primitives. Implementations frame each access
/// with the chip-select line themselves; `set_chip_select` is only used by the SMC sequencer
/// to hold the line while the console is held in reset.
#[trait_variant::make(Send)]
pub trait RegisterBus {
    /// Read a 32-bit register
    async fn read_reg(&mut self, reg: u8) -> u32;
    /// Write a 32-bit register
    async fn write_reg(&mut self, reg: u8, value: u32);
    /// Drive the chip-select line. `true` asserts it (line low).
    fn set_chip_select(&mut self, asserted: bool);
    /// Take ownership of the bus pins
    fn init(&mut self);
    /// Release the bus pins so the console can drive them
    fn deinit(&mut self);
}

/// Monotonic millisecond clock used for wall-clock timeouts
pub trait TimeSource {
    fn now_ms(&self) -> u64;
}
