use bit_field::BitField;

/// Bytes per logical sector
pub const SECTOR_SIZE: u32 = 0x200;

/// Flash configuration word read from the controller's config register
///
/// | Bits   | Description                        |
/// | ------ | ---------------------------------- |
/// | 4..6   | Minor revision (block size class)  |
/// | 17..19 | Major revision (controller family) |
/// | 28..32 | 0xC on eMMC-backed consoles        |
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlashConfig(pub u32);

impl FlashConfig {
    pub fn raw(&self) -> u32 {
        self.0
    }

    pub fn major(&self) -> u32 {
        self.0.get_bits(17..19)
    }

    pub fn minor(&self) -> u32 {
        self.0.get_bits(4..6)
    }

    /// Erase block size in bytes
    pub fn erase_block_size(&self) -> u32 {
        if self.major() >= 1 {
            match self.minor() {
                2 => return 0x20000,
                3 => return 0x40000,
                _ => {}
            }
        }
        0x4000
    }

    /// Sectors covered by one erase block
    pub fn sectors_per_erase_block(&self) -> u32 {
        self.erase_block_size() / SECTOR_SIZE
    }

    /// Whether `lba` is the first sector of an erase block
    pub fn is_erase_block_start(&self, lba: u32) -> bool {
        lba % self.sectors_per_erase_block() == 0
    }

    /// Whether the controller answered. Zero means not up yet and an undriven bus reads as
    /// all ones.
    pub fn is_present(&self) -> bool {
        self.0 != 0 && self.0 != u32::MAX
    }

    /// Console stores its system image on eMMC instead of raw NAND
    pub fn is_emmc(&self) -> bool {
        (self.0 & 0xF000_0000) == 0xC000_0000
    }
}
