/* System Setup */

/// Core1 (storage worker) stack size
pub const CORE1_STACK_SIZE: usize = 16 * 1024;

/// USB -> dispatcher byte pipe size
pub const USB_RX_PIPE_SIZE: usize = 2048;
/// Dispatcher -> USB byte pipe size (two NAND stream blocks with their status words)
pub const USB_TX_PIPE_SIZE: usize = 2048;
/// Frames waiting in the dispatcher's staging buffer (a WriteFlash frame + spare)
pub const HOST_STAGING_SIZE: usize = 1024;

/* USB Setup */

/// USB device vendor ID
pub const USB_VID: u16 = 0x600d;
/// USB device product ID
pub const USB_PID: u16 = 0x7001;
/// USB device manufacturer string
pub const USB_MANUFACTURER: &str = "picoflasher";
/// USB device product string
pub const USB_PRODUCT: &str = "picoflasher";
/// USB device serial number string
pub const USB_SERIAL_NUMBER: &str = "0001";
/// USB device maximum power consumption in mA
pub const USB_MAX_POWER: u16 = 100;
/// USB device maximum packet size
pub const USB_MAX_PACKET_SIZE: usize = 64;

/* spiex Setup */

/// SPI clock towards the console's flash controller
pub const SPIEX_FREQUENCY_HZ: u32 = 12_000_000;
/// Register access: read opcode in the low bits of `(reg << 2)`
pub const SPIEX_OP_READ: u8 = 0x01;
/// Register access: write opcode in the low bits of `(reg << 2)`
pub const SPIEX_OP_WRITE: u8 = 0x02;
/// Register value while the bus is released to the console
pub const SPIEX_RELEASED_VALUE: u32 = 0xFFFF_FFFF;

/* Host loop */

/// Pause between host loop iterations when there is nothing to do
pub const HOST_IDLE_POLL_US: u64 = 50;
