//! Register-level models of the console's flash controller, used by the unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::common::flash_config::FlashConfig;
use crate::common::register_bus::{RegisterBus, TimeSource};

/// 512 bytes of data + 16 bytes of spare, as 32-bit words
pub const NAND_PAGE_WORDS: usize = 132;
/// 512 bytes as 32-bit words
pub const EMMC_BLOCK_WORDS: usize = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusAccess {
    Read(u8),
    Write(u8, u32),
}

/// NAND controller model.
///
/// The address register resets the data cursor, so both the read and the write sequence walk
/// the page buffer from word 0. Programming ANDs into the stored page like real NAND, so a
/// write that skips the erase corrupts data the same way hardware would.
pub struct SimNand {
    pub config: u32,
    pub status: u32,
    /// Busy polls reported after each read/erase/program
    pub busy_polls: u32,
    pub stuck_busy: bool,
    /// Page read of this sector never leaves busy
    pub fail_lba: Option<u32>,
    pub status_reads: usize,
    pub config_reads: usize,
    pub storage: HashMap<u32, [u32; NAND_PAGE_WORDS]>,
    pub erased: Vec<u32>,
    pub log: Vec<BusAccess>,
    pub chip_select: bool,
    pub enabled: bool,
    busy_remaining: u32,
    address: u32,
    data: u32,
    cursor: usize,
    page: [u32; NAND_PAGE_WORDS],
    unlock: Vec<u32>,
}

impl SimNand {
    pub fn new(config: u32) -> Self {
        Self {
            config,
            status: 0,
            busy_polls: 2,
            stuck_busy: false,
            fail_lba: None,
            status_reads: 0,
            config_reads: 0,
            storage: HashMap::new(),
            erased: Vec::new(),
            log: Vec::new(),
            chip_select: false,
            enabled: true,
            busy_remaining: 0,
            address: 0,
            data: 0,
            cursor: 0,
            page: [!0; NAND_PAGE_WORDS],
            unlock: Vec::new(),
        }
    }

    /// Store a page directly, bypassing the command sequence
    pub fn preload(&mut self, lba: u32, bytes: &[u8]) {
        let mut page = [!0u32; NAND_PAGE_WORDS];
        for (word, chunk) in page.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        self.storage.insert(lba, page);
    }

    /// Stored page as bytes (erased pages read back as 0xFF)
    pub fn page_bytes(&self, lba: u32) -> Vec<u8> {
        let page = self.storage.get(&lba).copied().unwrap_or([!0; NAND_PAGE_WORDS]);
        page.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    fn start_busy(&mut self) {
        self.busy_remaining = self.busy_polls;
    }

    fn command(&mut self, value: u32) {
        match value {
            0x00 => {
                self.data = self.page.get(self.cursor).copied().unwrap_or(0);
                self.cursor += 1;
            }
            0x01 => {
                if let Some(word) = self.page.get_mut(self.cursor) {
                    *word = self.data;
                }
                self.cursor += 1;
            }
            0x03 => {
                let lba = self.address >> 9;
                self.page = self.storage.get(&lba).copied().unwrap_or([!0; NAND_PAGE_WORDS]);
                self.start_busy();
                if self.fail_lba == Some(lba) {
                    self.busy_remaining = u32::MAX;
                }
            }
            _ => {
                self.unlock.push(value);
                if self.unlock.ends_with(&[0xAA, 0x55, 0x05]) {
                    self.unlock.clear();
                    self.erase(self.address >> 9);
                    self.start_busy();
                } else if self.unlock.ends_with(&[0x55, 0xAA, 0x04]) {
                    self.unlock.clear();
                    self.program(self.address >> 9);
                    self.start_busy();
                }
            }
        }
    }

    fn erase(&mut self, lba: u32) {
        let sectors = FlashConfig(self.config).sectors_per_erase_block();
        let base = lba - lba % sectors;
        for sector in base..base + sectors {
            self.storage.remove(&sector);
        }
        self.erased.push(lba);
    }

    fn program(&mut self, lba: u32) {
        let stored = self.storage.entry(lba).or_insert([!0; NAND_PAGE_WORDS]);
        for (dst, src) in stored.iter_mut().zip(self.page.iter()) {
            *dst &= *src;
        }
    }
}

impl RegisterBus for SimNand {
    async fn read_reg(&mut self, reg: u8) -> u32 {
        self.log.push(BusAccess::Read(reg));
        match reg {
            0x00 => {
                self.config_reads += 1;
                self.config
            }
            0x04 => {
                self.status_reads += 1;
                if self.stuck_busy {
                    self.status | 0x01
                } else if self.busy_remaining > 0 {
                    self.busy_remaining -= 1;
                    self.status | 0x01
                } else {
                    self.status
                }
            }
            0x10 => self.data,
            _ => 0,
        }
    }

    async fn write_reg(&mut self, reg: u8, value: u32) {
        self.log.push(BusAccess::Write(reg, value));
        match reg {
            0x00 => self.config = value,
            0x04 => self.status &= !value,
            0x08 => self.command(value),
            0x0C => {
                self.address = value;
                self.cursor = 0;
            }
            0x10 => self.data = value,
            _ => {}
        }
    }

    fn set_chip_select(&mut self, asserted: bool) {
        self.chip_select = asserted;
    }

    fn init(&mut self) {
        self.enabled = true;
    }

    fn deinit(&mut self) {
        self.enabled = false;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IssuedCommand {
    pub index: u32,
    pub block: u32,
    pub argument: u32,
    pub word: u32,
}

/// eMMC host controller model. Commands complete immediately unless their index is listed
/// in `failing`, in which case no interrupt bit is ever raised.
pub struct SimEmmc {
    /// Flash config word seen at register 0
    pub config: u32,
    pub ints: u32,
    pub control1: u32,
    /// Internal clock becomes stable once enabled
    pub clock_stable: bool,
    pub failing: HashSet<u32>,
    pub cid: [u32; 4],
    pub csd: [u32; 4],
    pub ext_csd: [u32; EMMC_BLOCK_WORDS],
    pub sectors: HashMap<u32, [u32; EMMC_BLOCK_WORDS]>,
    pub commands: Vec<IssuedCommand>,
    pub log: Vec<BusAccess>,
    pub ints_reads: usize,
    block: u32,
    argument: u32,
    response: [u32; 4],
    fifo: VecDeque<u32>,
    write_lba: u32,
    write_buf: Vec<u32>,
}

impl SimEmmc {
    pub fn new() -> Self {
        Self {
            config: 0xC000_0000,
            ints: 0,
            control1: 0,
            clock_stable: true,
            failing: HashSet::new(),
            cid: [0x1111_1111, 0x2222_2222, 0x3333_3333, 0x4444_4444],
            csd: [0xAAAA_0001, 0xAAAA_0002, 0xAAAA_0003, 0xAAAA_0004],
            ext_csd: core::array::from_fn(|i| i as u32),
            sectors: HashMap::new(),
            commands: Vec::new(),
            log: Vec::new(),
            ints_reads: 0,
            block: 0,
            argument: 0,
            response: [0; 4],
            fifo: VecDeque::new(),
            write_lba: 0,
            write_buf: Vec::new(),
        }
    }

    pub fn sector_bytes(&self, lba: u32) -> Vec<u8> {
        let sector = self.sectors.get(&lba).copied().unwrap_or([0; EMMC_BLOCK_WORDS]);
        sector.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    pub fn command_indices(&self) -> Vec<u32> {
        self.commands.iter().map(|c| c.index).collect()
    }

    fn issue(&mut self, word: u32) {
        let index = (word >> 24) & 0x3F;
        self.commands.push(IssuedCommand {
            index,
            block: self.block,
            argument: self.argument,
            word,
        });
        if self.failing.contains(&index) {
            return;
        }
        self.ints |= 0x01;
        match index {
            9 => self.response = self.cid,
            10 => self.response = self.csd,
            8 => {
                self.fifo = self.ext_csd.iter().copied().collect();
                self.ints |= 0x20;
            }
            17 => {
                let sector = self
                    .sectors
                    .get(&(self.argument >> 9))
                    .copied()
                    .unwrap_or([0; EMMC_BLOCK_WORDS]);
                self.fifo = sector.iter().copied().collect();
                self.ints |= 0x20;
            }
            24 => {
                self.write_lba = self.argument >> 9;
                self.write_buf.clear();
                self.ints |= 0x10;
            }
            _ => {}
        }
    }
}

impl RegisterBus for SimEmmc {
    async fn read_reg(&mut self, reg: u8) -> u32 {
        self.log.push(BusAccess::Read(reg));
        match reg {
            0x00 => self.config,
            0x10..=0x1C => self.response[usize::from((reg - 0x10) / 4)],
            0x20 => self.fifo.pop_front().unwrap_or(0),
            0x2C => self.control1,
            0x30 => {
                self.ints_reads += 1;
                self.ints
            }
            0x3C if self.clock_stable && self.control1 & (1 << 24) != 0 => 1 << 24,
            _ => 0,
        }
    }

    async fn write_reg(&mut self, reg: u8, value: u32) {
        self.log.push(BusAccess::Write(reg, value));
        match reg {
            0x04 => self.block = value,
            0x08 => self.argument = value,
            0x0C => self.issue(value),
            0x20 => {
                self.write_buf.push(value);
                if self.write_buf.len() == EMMC_BLOCK_WORDS {
                    let mut sector = [0; EMMC_BLOCK_WORDS];
                    sector.copy_from_slice(&self.write_buf);
                    self.sectors.insert(self.write_lba, sector);
                    self.ints |= 0x02;
                }
            }
            0x2C => self.control1 = value,
            0x30 => self.ints &= !value,
            _ => {}
        }
    }

    fn set_chip_select(&mut self, _asserted: bool) {}

    fn init(&mut self) {}

    fn deinit(&mut self) {}
}

/// Clock that advances by `step` milliseconds every time it is read
pub struct StepClock {
    now: AtomicU64,
    step: u64,
}

impl StepClock {
    pub fn new(step: u64) -> Self {
        Self {
            now: AtomicU64::new(0),
            step,
        }
    }

    pub fn elapsed(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl TimeSource for StepClock {
    fn now_ms(&self) -> u64 {
        self.now.fetch_add(self.step, Ordering::SeqCst)
    }
}

/// Output pin that only remembers its level
#[derive(Default)]
pub struct FakePin {
    pub high: bool,
}

impl embedded_hal::digital::ErrorType for FakePin {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        Ok(())
    }
}

/// Delay that returns immediately
pub struct NoDelay;

impl embedded_hal_async::delay::DelayNs for NoDelay {
    async fn delay_ns(&mut self, _ns: u32) {}
}

/// In-memory host link
pub struct MockTransport {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
    pub flushes: usize,
    pub write_space: usize,
    /// When false, written bytes stay queued and eat into `write_space`
    pub host_reading: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            rx: VecDeque::new(),
            tx: Vec::new(),
            flushes: 0,
            write_space: 4096,
            host_reading: true,
        }
    }

    pub fn push_frame(&mut self, command: u8, lba: u32, payload: &[u8]) {
        self.rx.push_back(command);
        self.rx.extend(lba.to_le_bytes());
        self.rx.extend(payload.iter().copied());
    }
}

impl crate::host::transport::HostTransport for MockTransport {
    fn available(&mut self) -> usize {
        self.rx.len()
    }

    fn peek(&mut self) -> Option<u8> {
        self.rx.front().copied()
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let count = buf.len().min(self.rx.len());
        for (dst, src) in buf.iter_mut().zip(self.rx.drain(..count)) {
            *dst = src;
        }
        count
    }

    fn write_available(&self) -> usize {
        self.write_space
    }

    async fn write(&mut self, data: &[u8]) {
        self.tx.extend_from_slice(data);
        if !self.host_reading {
            self.write_space = self.write_space.saturating_sub(data.len());
        }
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}

pub struct PanicBoot;

impl crate::host::transport::BootControl for PanicBoot {
    fn reboot_to_bootloader(&mut self) -> ! {
        panic!("reboot to bootloader")
    }
}
