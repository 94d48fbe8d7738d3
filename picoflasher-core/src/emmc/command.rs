use bitfield::bitfield;
use bitflags::bitflags;

/// Command indices understood by the console's eMMC controller
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum EmmcCommandIndex {
    SelectCard = 7,
    SendExtCsd = 8,
    // the controller answers CID on 9 and CSD on 10
    SendCid = 9,
    SendCsd = 10,
    SetBlocklen = 16,
    ReadSingleBlock = 17,
    WriteBlock = 24,
}

/// Response length/busy signalling
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ResponseType {
    None = 0b00,
    /// 136-bit response (CID/CSD)
    Long = 0b01,
    /// 48-bit response
    Short = 0b10,
    /// 48-bit response with busy
    ShortBusy = 0b11,
}

bitfield! {
    /// Command / transfer mode register (0x0C). Writing it starts the command.
    ///
    /// | Bits   | Description                 |
    /// | ------ | --------------------------- |
    /// | 29..24 | Command index               |
    /// | 21     | Data present                |
    /// | 20     | Command index check         |
    /// | 19     | Command CRC check           |
    /// | 17..16 | Response type               |
    /// | 4      | Data direction (1: card->host) |
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct CommandRegister(u32);
    pub index, set_index: 29, 24;
    pub data_present, set_data_present: 21;
    pub index_check, set_index_check: 20;
    pub crc_check, set_crc_check: 19;
    pub response_type, set_response_type: 17, 16;
    pub data_read, set_data_read: 4;
}

impl CommandRegister {
    /// Command without data phase. Short responses get CRC and index checks.
    pub fn new(index: EmmcCommandIndex, response: ResponseType) -> Self {
        let mut command = CommandRegister(0);
        command.set_index(index as u32);
        command.set_response_type(response as u32);
        if matches!(response, ResponseType::Short | ResponseType::ShortBusy) {
            command.set_crc_check(true);
            command.set_index_check(true);
        }
        command
    }

    /// Single block transfer from the card
    pub fn with_read_data(mut self) -> Self {
        self.set_data_present(true);
        self.set_data_read(true);
        self
    }

    /// Single block transfer to the card
    pub fn with_write_data(mut self) -> Self {
        self.set_data_present(true);
        self.set_data_read(false);
        self
    }
}

bitfield! {
    /// Block size / count register (0x04)
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct BlockRegister(u32);
    pub block_size, set_block_size: 11, 0;
    pub block_count, set_block_count: 31, 16;
}

impl BlockRegister {
    pub fn new(block_size: u32, block_count: u32) -> Self {
        let mut block = BlockRegister(0);
        block.set_block_size(block_size);
        block.set_block_count(block_count);
        block
    }
}

bitflags! {
    /// Interrupt status register (0x30), write 1 to clear
    #[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
    pub struct EmmcInterrupt: u32 {
        const COMMAND_COMPLETE = 0x0000_0001;
        const TRANSFER_COMPLETE = 0x0000_0002;
        const BUFFER_WRITE_READY = 0x0000_0010;
        const BUFFER_READ_READY = 0x0000_0020;
        const _ = !0;
    }
}
