/// Host byte stream (USB CDC on the firmware)
#[trait_variant::make(Send)]
pub trait HostTransport {
    /// Bytes ready to be read
    fn available(&mut self) -> usize;
    /// Next byte without consuming it
    fn peek(&mut self) -> Option<u8>;
    /// Read up to `buf.len()` bytes, returns the count read
    fn read(&mut self, buf: &mut [u8]) -> usize;
    /// Outbound space that can be written without waiting
    fn write_available(&self) -> usize;
    async fn write(&mut self, data: &[u8]);
    /// Ask for buffered outbound bytes to be pushed to the host. Does not wait for the host
    /// to take them; `write_available` is the backpressure signal.
    fn flush(&mut self);
}

/// Re-entry into the ROM USB bootloader
pub trait BootControl {
    fn reboot_to_bootloader(&mut self) -> !;
}
