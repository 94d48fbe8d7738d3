use byteorder::{ByteOrder, LittleEndian};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::work::item::{PAYLOAD_SIZE, SECTOR_SIZE};

/// `[command: u8][lba: u32 LE]`
pub const FRAME_HEADER_LEN: usize = 5;

/// Host command IDs
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommandId {
    GetVersion = 0x00,
    GetFlashConfig = 0x01,
    ReadFlash = 0x02,
    WriteFlash = 0x03,
    ReadFlashStream = 0x04,
    EmmcDetect = 0x50,
    EmmcInit = 0x51,
    EmmcGetCid = 0x52,
    EmmcGetCsd = 0x53,
    EmmcGetExtCsd = 0x54,
    EmmcRead = 0x55,
    EmmcReadStream = 0x56,
    EmmcWrite = 0x57,
    GetPost = 0x80,
    StartSmc = 0xC0,
    StopSmc = 0xC1,
    RebootToBootloader = 0xFE,
}

impl CommandId {
    /// Bytes following the header
    pub fn payload_len(&self) -> usize {
        match self {
            CommandId::WriteFlash => PAYLOAD_SIZE,
            CommandId::EmmcWrite => SECTOR_SIZE,
            _ => 0,
        }
    }
}

/// Whole frame length announced by its first byte. Unknown commands are header only.
pub fn frame_len(command: u8) -> usize {
    FRAME_HEADER_LEN
        + CommandId::try_from(command)
            .map(|id| id.payload_len())
            .unwrap_or(0)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameHeader {
    pub command: u8,
    /// LBA, or end offset for stream commands
    pub lba: u32,
}

impl FrameHeader {
    pub fn parse(bytes: &[u8; FRAME_HEADER_LEN]) -> Self {
        Self {
            command: bytes[0],
            lba: LittleEndian::read_u32(&bytes[1..]),
        }
    }
}
