use byteorder::{ByteOrder, LittleEndian};

use crate::common::flash_config::FlashConfig;

/// Sector data bytes
pub const SECTOR_SIZE: usize = 0x200;
/// NAND spare (metadata) bytes following each sector
pub const SPARE_SIZE: usize = 0x10;
/// Sector + spare
pub const PAYLOAD_SIZE: usize = SECTOR_SIZE + SPARE_SIZE;

/// Storage operation executed by the worker
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WorkOp {
    ReadNand,
    WriteNand,
    ReadEmmc,
    WriteEmmc,
    InitEmmc,
    ReadCid,
    ReadCsd,
    ReadExtCsd,
    GetFlashConfig,
    StartSmc,
    StopSmc,
}

impl WorkOp {
    /// Whether the worker posts the item back on the response queue
    pub fn has_response(&self) -> bool {
        !matches!(
            self,
            WorkOp::WriteNand | WorkOp::WriteEmmc | WorkOp::StartSmc | WorkOp::StopSmc
        )
    }
}

/// Unit of work exchanged between the cores, moved by value
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WorkItem {
    pub op: WorkOp,
    /// LBA for block operations
    pub block_offset: u32,
    /// 0 on success, engine specific code otherwise
    pub status: u32,
    /// Write input / read output
    pub payload: [u8; PAYLOAD_SIZE],
}

#[cfg(feature = "defmt")]
impl defmt::Format for WorkItem {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "WorkItem {{ op: {}, block_offset: {}, status: {:#x} }}",
            self.op,
            self.block_offset,
            self.status
        )
    }
}

impl WorkItem {
    pub fn new(op: WorkOp) -> Self {
        Self::with_block(op, 0)
    }

    pub fn with_block(op: WorkOp, block_offset: u32) -> Self {
        Self {
            op,
            block_offset,
            status: 0,
            payload: [0; PAYLOAD_SIZE],
        }
    }

    /// Sector part of the payload
    pub fn data(&self) -> &[u8] {
        &self.payload[..SECTOR_SIZE]
    }

    /// Spare part of the payload
    pub fn spare(&self) -> &[u8] {
        &self.payload[SECTOR_SIZE..]
    }

    /// Flash config word carried by a `GetFlashConfig` response
    pub fn flash_config(&self) -> FlashConfig {
        FlashConfig(LittleEndian::read_u32(&self.payload[..4]))
    }

    pub fn set_flash_config(&mut self, config: FlashConfig) {
        LittleEndian::write_u32(&mut self.payload[..4], config.raw());
    }
}
