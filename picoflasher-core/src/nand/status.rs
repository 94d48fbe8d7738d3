use bitflags::bitflags;

/// NAND controller status register (0x04)
///
/// | Bit  | Description                      |
/// | ---- | -------------------------------- |
/// | 0    | Busy                             |
/// | 1..  | Controller specific error flags  |
bitflags! {
    #[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
    pub struct NandStatus: u16 {
        const BUSY = 0b0000_0000_0000_0001;
        // keep every raw bit, the whole word is reported back to the host on timeout
        const _ = !0;
    }
}

impl NandStatus {
    pub fn is_busy(&self) -> bool {
        self.contains(NandStatus::BUSY)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for NandStatus {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "NandStatus({=u16:#x})", self.bits())
    }
}
