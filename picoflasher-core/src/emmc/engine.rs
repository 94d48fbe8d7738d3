use byteorder::{ByteOrder, LittleEndian};

use crate::common::register_bus::{RegisterBus, TimeSource};
use crate::emmc::command::{
    BlockRegister, CommandRegister, EmmcCommandIndex, EmmcInterrupt, ResponseType,
};
use crate::emmc::error::EmmcError;

/// eMMC host controller registers
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum EmmcRegister {
    Block = 0x04,
    Argument = 0x08,
    Command = 0x0C,
    /// 0x10..0x1C
    Response = 0x10,
    DataPort = 0x20,
    Control1 = 0x2C,
    Interrupt = 0x30,
    Control2 = 0x3C,
}

pub const BLOCK_SIZE: usize = 0x200;
/// CID / CSD register size
pub const CARD_REGISTER_SIZE: usize = 16;

const CLOCK_ENABLE: u32 = 1 << 24;
const CLOCK_STABLE: u32 = 1 << 24;
const INIT_TIMEOUT_MS: u64 = 5000;
const COMMAND_TIMEOUT_MS: u64 = 100;
const TRANSFER_TIMEOUT_MS: u64 = 1500;
/// RCA of the card soldered on the board
const CARD_RCA_ARGUMENT: u32 = 0xFFFF_0000;

/// eMMC access through the controller's register window
pub struct EmmcEngine<C: TimeSource> {
    clock: C,
}

impl<C: TimeSource> EmmcEngine<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    /// Acknowledge every pending interrupt, then program the controller:
    ///
    /// | Register | Offset | Value                        |
    /// | -------- | ------ | ---------------------------- |
    /// | Block    | 0x04   | block count and size         |
    /// | Argument | 0x08   | command argument             |
    /// | Command  | 0x0C   | index and response/data mode |
    ///
    /// The command register is written last; that write starts execution. Read as an
    /// `(arg, cmd, mode)` sequence: 0x04 takes the first write, 0x08 the second and 0x0C the
    /// third, with index and transfer mode sharing 0x0C.
    pub async fn execute<B: RegisterBus>(
        &self,
        bus: &mut B,
        block: BlockRegister,
        argument: u32,
        command: CommandRegister,
    ) {
        let pending = bus.read_reg(EmmcRegister::Interrupt as u8).await;
        bus.write_reg(EmmcRegister::Interrupt as u8, pending).await;

        bus.write_reg(EmmcRegister::Block as u8, block.0).await;
        bus.write_reg(EmmcRegister::Argument as u8, argument).await;
        bus.write_reg(EmmcRegister::Command as u8, command.0).await;
    }

    /// Poll until every bit of `mask` is latched, or `timeout_ms` has passed.
    pub async fn wait_ints<B: RegisterBus>(
        &self,
        bus: &mut B,
        mask: EmmcInterrupt,
        timeout_ms: u64,
    ) -> Result<(), EmmcError> {
        let deadline = self.clock.now_ms() + timeout_ms;
        loop {
            let ints = EmmcInterrupt::from_bits_retain(bus.read_reg(EmmcRegister::Interrupt as u8).await);
            if ints.contains(mask) {
                return Ok(());
            }
            if self.clock.now_ms() >= deadline {
                warn!(
                    "eMMC interrupt timeout: mask={:#x} ints={:#x}",
                    mask.bits(),
                    ints.bits()
                );
                return Err(EmmcError::Timeout);
            }
        }
    }

    /// Enable the controller clock and wait for it to settle
    pub async fn init<B: RegisterBus>(&self, bus: &mut B) -> Result<(), EmmcError> {
        let control1 = bus.read_reg(EmmcRegister::Control1 as u8).await;
        bus.write_reg(EmmcRegister::Control1 as u8, control1 | CLOCK_ENABLE)
            .await;

        let deadline = self.clock.now_ms() + INIT_TIMEOUT_MS;
        loop {
            if bus.read_reg(EmmcRegister::Control2 as u8).await & CLOCK_STABLE != 0 {
                info!("eMMC controller ready");
                return Ok(());
            }
            if self.clock.now_ms() >= deadline {
                warn!("eMMC init timeout");
                return Err(EmmcError::Timeout);
            }
        }
    }

    async fn command<B: RegisterBus>(
        &self,
        bus: &mut B,
        block: BlockRegister,
        argument: u32,
        command: CommandRegister,
    ) -> Result<(), EmmcError> {
        self.execute(bus, block, argument, command).await;
        self.wait_ints(bus, EmmcInterrupt::COMMAND_COMPLETE, COMMAND_TIMEOUT_MS)
            .await
    }

    async fn deselect_card<B: RegisterBus>(&self, bus: &mut B) -> Result<(), EmmcError> {
        let command = CommandRegister::new(EmmcCommandIndex::SelectCard, ResponseType::None);
        self.command(bus, BlockRegister(0), 0, command).await
    }

    async fn select_card<B: RegisterBus>(&self, bus: &mut B) -> Result<(), EmmcError> {
        let command = CommandRegister::new(EmmcCommandIndex::SelectCard, ResponseType::Short);
        self.command(bus, BlockRegister(0), CARD_RCA_ARGUMENT, command)
            .await
    }

    async fn set_blocklen<B: RegisterBus>(&self, bus: &mut B, length: u32) -> Result<(), EmmcError> {
        let command = CommandRegister::new(EmmcCommandIndex::SetBlocklen, ResponseType::Short);
        self.command(bus, BlockRegister::new(BLOCK_SIZE as u32, 0), length, command)
            .await
    }

    async fn read_card_register<B: RegisterBus>(
        &self,
        bus: &mut B,
        index: EmmcCommandIndex,
        out: &mut [u8],
    ) -> Result<(), EmmcError> {
        let command = CommandRegister::new(index, ResponseType::Long);
        self.command(bus, BlockRegister(0), CARD_RCA_ARGUMENT, command)
            .await?;

        let mut reg = EmmcRegister::Response as u8;
        for chunk in out.chunks_exact_mut(4).take(CARD_REGISTER_SIZE / 4) {
            LittleEndian::write_u32(chunk, bus.read_reg(reg).await);
            reg += 4;
        }
        Ok(())
    }

    /// Card identification register (16 bytes)
    pub async fn read_cid<B: RegisterBus>(&self, bus: &mut B, out: &mut [u8]) -> Result<(), EmmcError> {
        self.read_card_register(bus, EmmcCommandIndex::SendCid, out)
            .await
    }

    /// Card specific data register (16 bytes)
    pub async fn read_csd<B: RegisterBus>(&self, bus: &mut B, out: &mut [u8]) -> Result<(), EmmcError> {
        self.read_card_register(bus, EmmcCommandIndex::SendCsd, out)
            .await
    }

    async fn read_selected<B: RegisterBus>(
        &self,
        bus: &mut B,
        argument: u32,
        index: EmmcCommandIndex,
        out: &mut [u8],
    ) -> Result<(), EmmcError> {
        self.select_card(bus).await?;
        if index == EmmcCommandIndex::ReadSingleBlock {
            self.set_blocklen(bus, BLOCK_SIZE as u32).await?;
        }

        let command = CommandRegister::new(index, ResponseType::Short).with_read_data();
        self.execute(bus, BlockRegister::new(BLOCK_SIZE as u32, 1), argument, command)
            .await;
        self.wait_ints(
            bus,
            EmmcInterrupt::COMMAND_COMPLETE | EmmcInterrupt::BUFFER_READ_READY,
            TRANSFER_TIMEOUT_MS,
        )
        .await?;

        for chunk in out.chunks_exact_mut(4).take(BLOCK_SIZE / 4) {
            LittleEndian::write_u32(chunk, bus.read_reg(EmmcRegister::DataPort as u8).await);
        }
        Ok(())
    }

    /// Read one 512-byte block. The card is deselected afterwards whatever happened.
    pub async fn read_block<B: RegisterBus>(
        &self,
        bus: &mut B,
        lba: u32,
        out: &mut [u8],
    ) -> Result<(), EmmcError> {
        trace!("eMMC read: lba={}", lba);
        let result = self
            .read_selected(bus, lba << 9, EmmcCommandIndex::ReadSingleBlock, out)
            .await;
        let deselect = self.deselect_card(bus).await;
        result.and(deselect)
    }

    /// Read the 512-byte extended CSD
    pub async fn read_ext_csd<B: RegisterBus>(&self, bus: &mut B, out: &mut [u8]) -> Result<(), EmmcError> {
        let result = self
            .read_selected(bus, 0, EmmcCommandIndex::SendExtCsd, out)
            .await;
        let deselect = self.deselect_card(bus).await;
        result.and(deselect)
    }

    async fn write_selected<B: RegisterBus>(
        &self,
        bus: &mut B,
        lba: u32,
        data: &[u8],
    ) -> Result<(), EmmcError> {
        self.select_card(bus).await?;
        self.set_blocklen(bus, BLOCK_SIZE as u32).await?;

        let command = CommandRegister::new(EmmcCommandIndex::WriteBlock, ResponseType::Short)
            .with_write_data();
        self.command(bus, BlockRegister::new(BLOCK_SIZE as u32, 1), lba << 9, command)
            .await?;

        for chunk in data.chunks_exact(4).take(BLOCK_SIZE / 4) {
            bus.write_reg(EmmcRegister::DataPort as u8, LittleEndian::read_u32(chunk))
                .await;
        }
        self.wait_ints(
            bus,
            EmmcInterrupt::TRANSFER_COMPLETE | EmmcInterrupt::BUFFER_WRITE_READY,
            TRANSFER_TIMEOUT_MS,
        )
        .await
    }

    /// Write one 512-byte block. The card is deselected afterwards whatever happened.
    pub async fn write_block<B: RegisterBus>(
        &self,
        bus: &mut B,
        lba: u32,
        data: &[u8],
    ) -> Result<(), EmmcError> {
        trace!("eMMC write: lba={}", lba);
        let result = self.write_selected(bus, lba, data).await;
        let deselect = self.deselect_card(bus).await;
        result.and(deselect)
    }
}
