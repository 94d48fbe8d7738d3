use byteorder::{ByteOrder, LittleEndian};
use embassy_rp::gpio::{Level, Output};
use embassy_rp::pac;
use embassy_rp::peripherals::SPI0;
use embassy_rp::spi::{Blocking, Spi};
use picoflasher_core::common::register_bus::RegisterBus;

use crate::shared::constant::*;

/// GPIO function select: SPI
const FUNCSEL_SPI: u8 = 1;
/// GPIO function select: none (pin floats)
const FUNCSEL_NULL: u8 = 0x1f;

/// The console shifts LSB first, the RP2040 SPI block MSB first
fn swap_bit_order(buf: &mut [u8]) {
    for byte in buf.iter_mut() {
        *byte = byte.reverse_bits();
    }
}

/// Register bus over SPI0, chip select framed per access.
///
/// While released (`deinit`) the SPI pins are detached so the console can drive the bus;
/// reads then return all ones and writes are dropped.
pub struct SpiexBus<'d> {
    spi: Spi<'d, SPI0, Blocking>,
    ss_n: Output<'d>,
    /// GPIO numbers of CLK/MOSI/MISO
    spi_pins: [usize; 3],
    released: bool,
}

impl<'d> SpiexBus<'d> {
    pub fn new(spi: Spi<'d, SPI0, Blocking>, ss_n: Output<'d>, spi_pins: [usize; 3]) -> Self {
        Self {
            spi,
            ss_n,
            spi_pins,
            released: false,
        }
    }

    fn set_pin_function(&self, funcsel: u8) {
        for pin in self.spi_pins {
            pac::IO_BANK0
                .gpio(pin)
                .ctrl()
                .modify(|w| w.set_funcsel(funcsel));
        }
    }

    /// One chip-select framed transfer
    fn transfer(&mut self, buf: &mut [u8]) {
        swap_bit_order(buf);
        self.ss_n.set_low();
        if let Err(e) = self.spi.blocking_transfer_in_place(buf) {
            crate::warn!("spiex transfer error: {}", e);
        }
        self.ss_n.set_high();
        swap_bit_order(buf);
    }
}

impl RegisterBus for SpiexBus<'_> {
    async fn read_reg(&mut self, reg: u8) -> u32 {
        if self.released {
            return SPIEX_RELEASED_VALUE;
        }
        // opcode, dummy, 4 data bytes
        let mut buf = [(reg << 2) | SPIEX_OP_READ, 0xFF, 0, 0, 0, 0];
        self.transfer(&mut buf);
        LittleEndian::read_u32(&buf[2..])
    }

    async fn write_reg(&mut self, reg: u8, value: u32) {
        if self.released {
            return;
        }
        let mut buf = [(reg << 2) | SPIEX_OP_WRITE, 0, 0, 0, 0];
        LittleEndian::write_u32(&mut buf[1..], value);
        self.transfer(&mut buf);
    }

    fn set_chip_select(&mut self, asserted: bool) {
        self.ss_n.set_level(if asserted { Level::Low } else { Level::High });
    }

    fn init(&mut self) {
        self.set_pin_function(FUNCSEL_SPI);
        self.released = false;
        crate::debug!("spiex attached");
    }

    fn deinit(&mut self) {
        self.ss_n.set_high();
        self.set_pin_function(FUNCSEL_NULL);
        self.released = true;
        crate::debug!("spiex released");
    }
}
