use num_enum::{IntoPrimitive, TryFromPrimitive};

/// eMMC command result, negative codes as reported to the host
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(i32)]
pub enum EmmcError {
    /// Expected interrupt bits never latched before the deadline
    Timeout = -1,
    BadResponse = -2,
    Crc = -3,
    BadParam = -4,
}

impl EmmcError {
    /// Two's complement status word
    pub fn code(self) -> u32 {
        i32::from(self) as u32
    }
}

/// Status word for a completed eMMC operation (0 on success)
pub fn status_code(result: Result<(), EmmcError>) -> u32 {
    match result {
        Ok(()) => 0,
        Err(e) => e.code(),
    }
}
