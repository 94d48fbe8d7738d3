use byteorder::{ByteOrder, LittleEndian};

use crate::common::flash_config::FlashConfig;
use crate::common::register_bus::RegisterBus;
use crate::nand::status::NandStatus;

/// Polls of the status register after the first one before giving up
pub const DEFAULT_READY_BUDGET: u16 = 0x1000;

/// Config register bit that allows the next unlock sequence to erase
const CONFIG_ERASE_ENABLE: u32 = 0x08;
/// Unlock sequence for a block erase
const ERASE_SEQUENCE: [u32; 3] = [0xAA, 0x55, 0x05];
/// Unlock sequence for a page program
const PROGRAM_SEQUENCE: [u32; 3] = [0x55, 0xAA, 0x04];

/// NAND controller registers
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum NandRegister {
    Config = 0x00,
    Status = 0x04,
    Command = 0x08,
    Address = 0x0C,
    Data = 0x10,
}

/// NAND controller command opcodes
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum NandCommand {
    /// Shift the next word of the page buffer into the data register
    ReadData = 0x00,
    /// Shift the data register into the page buffer
    WriteData = 0x01,
    /// Load the page at the latched address into the page buffer
    PageRead = 0x03,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NandError {
    /// Busy bit never cleared. `status` is the register value read after giving up.
    Timeout { status: u16 },
}

impl NandError {
    /// Status word reported to the host
    pub fn code(&self) -> u32 {
        match self {
            NandError::Timeout { status } => 0x8000 | u32::from(*status),
        }
    }
}

/// Status word for a completed NAND operation (0 on success)
pub fn status_code(result: Result<(), NandError>) -> u32 {
    match result {
        Ok(()) => 0,
        Err(e) => e.code(),
    }
}

/// Raw NAND access through the controller's register window
pub struct NandEngine {
    flash_config: Option<FlashConfig>,
    ready_budget: u16,
}

impl Default for NandEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NandEngine {
    pub const fn new() -> Self {
        Self::with_ready_budget(DEFAULT_READY_BUDGET)
    }

    pub const fn with_ready_budget(ready_budget: u16) -> Self {
        Self {
            flash_config: None,
            ready_budget,
        }
    }

    async fn write_command<B: RegisterBus>(&self, bus: &mut B, command: u32) {
        bus.write_reg(NandRegister::Command as u8, command).await;
    }

    async fn latch_address<B: RegisterBus>(&self, bus: &mut B, address: u32) {
        bus.write_reg(NandRegister::Address as u8, address).await;
    }

    pub async fn get_status<B: RegisterBus>(&self, bus: &mut B) -> NandStatus {
        // upper half of the register is unused
        NandStatus::from_bits_retain(bus.read_reg(NandRegister::Status as u8).await as u16)
    }

    /// Write back the latched status bits to acknowledge them
    pub async fn clear_status<B: RegisterBus>(&self, bus: &mut B) {
        let status = bus.read_reg(NandRegister::Status as u8).await;
        bus.write_reg(NandRegister::Status as u8, status).await;
    }

    /// Poll the busy bit once, then up to `budget` more times.
    pub async fn wait_ready<B: RegisterBus>(&self, bus: &mut B, budget: u16) -> Result<(), NandError> {
        let mut remaining = budget;
        loop {
            if !self.get_status(bus).await.is_busy() {
                return Ok(());
            }
            if remaining == 0 {
                break;
            }
            remaining -= 1;
        }

        let status = self.get_status(bus).await;
        warn!("NAND wait ready timeout: status={:#x}", status.bits());
        Err(NandError::Timeout {
            status: status.bits(),
        })
    }

    async fn wait<B: RegisterBus>(&self, bus: &mut B) -> Result<(), NandError> {
        self.wait_ready(bus, self.ready_budget).await
    }

    /// Flash config word. Cached once the controller answers; zero or all-ones is re-read.
    pub async fn flash_config<B: RegisterBus>(&mut self, bus: &mut B) -> FlashConfig {
        if let Some(config) = self.flash_config {
            return config;
        }
        let config = FlashConfig(bus.read_reg(NandRegister::Config as u8).await);
        if config.is_present() {
            debug!("flash config: {:#x}", config.raw());
            self.flash_config = Some(config);
        }
        config
    }

    /// Read one sector. `data` is 512 bytes, `spare` 16 bytes.
    pub async fn read_block<B: RegisterBus>(
        &mut self,
        bus: &mut B,
        lba: u32,
        data: &mut [u8],
        spare: &mut [u8],
    ) -> Result<(), NandError> {
        trace!("NAND read: lba={}", lba);
        self.clear_status(bus).await;
        self.latch_address(bus, lba << 9).await;
        self.write_command(bus, NandCommand::PageRead as u32).await;
        self.wait(bus).await?;

        self.latch_address(bus, 0).await;
        for chunk in data.chunks_exact_mut(4).chain(spare.chunks_exact_mut(4)) {
            self.write_command(bus, NandCommand::ReadData as u32).await;
            LittleEndian::write_u32(chunk, bus.read_reg(NandRegister::Data as u8).await);
        }
        Ok(())
    }

    /// Erase the erase block starting at `lba`
    pub async fn erase_block<B: RegisterBus>(&mut self, bus: &mut B, lba: u32) -> Result<(), NandError> {
        trace!("NAND erase: lba={}", lba);
        self.clear_status(bus).await;
        let config = bus.read_reg(NandRegister::Config as u8).await;
        bus.write_reg(NandRegister::Config as u8, config | CONFIG_ERASE_ENABLE)
            .await;
        self.latch_address(bus, lba << 9).await;
        for command in ERASE_SEQUENCE {
            self.write_command(bus, command).await;
        }
        self.wait(bus).await
    }

    /// Program one sector, erasing first when `lba` starts an erase block.
    pub async fn write_block<B: RegisterBus>(
        &mut self,
        bus: &mut B,
        lba: u32,
        data: &[u8],
        spare: &[u8],
    ) -> Result<(), NandError> {
        let config = self.flash_config(bus).await;
        if config.is_erase_block_start(lba) {
            self.erase_block(bus, lba).await?;
        }

        trace!("NAND write: lba={}", lba);
        self.clear_status(bus).await;
        self.latch_address(bus, 0).await;
        for chunk in data.chunks_exact(4).chain(spare.chunks_exact(4)) {
            bus.write_reg(NandRegister::Data as u8, LittleEndian::read_u32(chunk))
                .await;
            self.write_command(bus, NandCommand::WriteData as u32).await;
        }
        self.wait(bus).await?;

        self.latch_address(bus, lba << 9).await;
        self.wait(bus).await?;

        for command in PROGRAM_SEQUENCE {
            self.write_command(bus, command).await;
        }
        self.wait(bus).await
    }
}
