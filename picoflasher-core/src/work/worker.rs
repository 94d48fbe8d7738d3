use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;

use crate::common::register_bus::{RegisterBus, TimeSource};
use crate::emmc;
use crate::emmc::engine::{EmmcEngine, CARD_REGISTER_SIZE};
use crate::nand;
use crate::nand::engine::NandEngine;
use crate::smc::sequencer::SmcSequencer;
use crate::work::item::{WorkItem, WorkOp, SECTOR_SIZE};
use crate::work::queue::WorkChannel;

/// Executes work items against the flash bus. Sole owner of the bus and the SMC lines.
pub struct StorageWorker<'ch, M, B, C, P, D>
where
    M: RawMutex,
    B: RegisterBus,
    C: TimeSource,
    P: OutputPin,
    D: DelayNs,
{
    channel: &'ch WorkChannel<M>,
    bus: B,
    nand: NandEngine,
    emmc: EmmcEngine<C>,
    smc: SmcSequencer<P, D>,
}

impl<'ch, M, B, C, P, D> StorageWorker<'ch, M, B, C, P, D>
where
    M: RawMutex,
    B: RegisterBus,
    C: TimeSource,
    P: OutputPin,
    D: DelayNs,
{
    pub fn new(
        channel: &'ch WorkChannel<M>,
        bus: B,
        emmc: EmmcEngine<C>,
        smc: SmcSequencer<P, D>,
    ) -> Self {
        Self {
            channel,
            bus,
            nand: NandEngine::new(),
            emmc,
            smc,
        }
    }

    /// Replace the NAND engine (ready budget tuning)
    pub fn with_nand_engine(mut self, nand: NandEngine) -> Self {
        self.nand = nand;
        self
    }

    #[cfg(test)]
    pub(crate) fn bus(&self) -> &B {
        &self.bus
    }

    /// Run one item, leaving the result in `status`/`payload`
    pub async fn execute(&mut self, item: &mut WorkItem) {
        let lba = item.block_offset;
        match item.op {
            WorkOp::ReadNand => {
                let (data, spare) = item.payload.split_at_mut(SECTOR_SIZE);
                let result = self.nand.read_block(&mut self.bus, lba, data, spare).await;
                item.status = nand::engine::status_code(result);
            }
            WorkOp::WriteNand => {
                let (data, spare) = item.payload.split_at(SECTOR_SIZE);
                let result = self.nand.write_block(&mut self.bus, lba, data, spare).await;
                item.status = nand::engine::status_code(result);
                if item.status != 0 {
                    warn!("NAND write failed: lba={} status={:#x}", lba, item.status);
                }
            }
            WorkOp::ReadEmmc => {
                let result = self
                    .emmc
                    .read_block(&mut self.bus, lba, &mut item.payload[..SECTOR_SIZE])
                    .await;
                item.status = emmc::error::status_code(result);
            }
            WorkOp::WriteEmmc => {
                let result = self
                    .emmc
                    .write_block(&mut self.bus, lba, &item.payload[..SECTOR_SIZE])
                    .await;
                item.status = emmc::error::status_code(result);
                if item.status != 0 {
                    warn!("eMMC write failed: lba={} status={:#x}", lba, item.status);
                }
            }
            WorkOp::InitEmmc => {
                let result = self.emmc.init(&mut self.bus).await;
                item.status = emmc::error::status_code(result);
            }
            WorkOp::ReadCid => {
                let result = self
                    .emmc
                    .read_cid(&mut self.bus, &mut item.payload[..CARD_REGISTER_SIZE])
                    .await;
                item.status = emmc::error::status_code(result);
            }
            WorkOp::ReadCsd => {
                let result = self
                    .emmc
                    .read_csd(&mut self.bus, &mut item.payload[..CARD_REGISTER_SIZE])
                    .await;
                item.status = emmc::error::status_code(result);
            }
            WorkOp::ReadExtCsd => {
                let result = self
                    .emmc
                    .read_ext_csd(&mut self.bus, &mut item.payload[..SECTOR_SIZE])
                    .await;
                item.status = emmc::error::status_code(result);
            }
            WorkOp::GetFlashConfig => {
                let config = self.nand.flash_config(&mut self.bus).await;
                item.set_flash_config(config);
                item.status = 0;
            }
            WorkOp::StartSmc => self.smc.start(&mut self.bus).await,
            WorkOp::StopSmc => self.smc.stop(&mut self.bus).await,
        }
    }

    /// Execute the head request, post its response, then retire the request
    pub async fn process_next(&mut self) {
        let mut item = self.channel.requests.peek_blocking().await;
        trace!("work: op={} lba={}", item.op, item.block_offset);
        self.execute(&mut item).await;
        if item.op.has_response() {
            self.channel.responses.submit_blocking(item).await;
        }
        let _ = self.channel.requests.try_take();
    }

    /// Worker loop, never returns
    pub async fn run(&mut self) {
        info!("storage worker started");
        loop {
            self.process_next().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePin, NoDelay, SimEmmc, SimNand, StepClock};
    use crate::work::item::PAYLOAD_SIZE;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use rstest::rstest;

    type Channel = WorkChannel<CriticalSectionRawMutex>;

    fn worker<B: RegisterBus>(
        channel: &Channel,
        bus: B,
    ) -> StorageWorker<'_, CriticalSectionRawMutex, B, StepClock, FakePin, NoDelay> {
        StorageWorker::new(
            channel,
            bus,
            EmmcEngine::new(StepClock::new(1)),
            SmcSequencer::new(FakePin::default(), FakePin::default(), NoDelay),
        )
        .with_nand_engine(NandEngine::with_ready_budget(16))
    }

    #[tokio::test]
    async fn test_read_nand_response() {
        let channel = Channel::new();
        let mut bus = SimNand::new(0);
        let page: Vec<u8> = (0..PAYLOAD_SIZE).map(|i| (i % 199) as u8).collect();
        bus.preload(12, &page);
        let mut worker = worker(&channel, bus);

        channel
            .requests
            .submit_blocking(WorkItem::with_block(WorkOp::ReadNand, 12))
            .await;
        worker.process_next().await;

        let response = channel.responses.try_take().unwrap();
        assert_eq!(response.status, 0);
        assert_eq!(response.block_offset, 12);
        assert_eq!(response.payload.to_vec(), page);
        assert!(channel.requests.is_empty());
    }

    #[tokio::test]
    async fn test_read_nand_timeout_status() {
        let channel = Channel::new();
        let mut bus = SimNand::new(0);
        bus.fail_lba = Some(4);
        let mut worker = worker(&channel, bus);

        channel
            .requests
            .submit_blocking(WorkItem::with_block(WorkOp::ReadNand, 4))
            .await;
        worker.process_next().await;

        assert_eq!(channel.responses.try_take().unwrap().status, 0x8001);
    }

    #[rstest]
    #[case(WorkOp::WriteNand)]
    #[case(WorkOp::StartSmc)]
    #[case(WorkOp::StopSmc)]
    #[tokio::test]
    async fn test_no_response_for_fire_and_forget(#[case] op: WorkOp) {
        let channel = Channel::new();
        let mut worker = worker(&channel, SimNand::new(0));

        channel.requests.submit_blocking(WorkItem::new(op)).await;
        worker.process_next().await;

        assert!(channel.responses.is_empty());
        assert!(channel.requests.is_empty());
    }

    #[tokio::test]
    async fn test_write_nand_stores_page() {
        let channel = Channel::new();
        let mut worker = worker(&channel, SimNand::new(0));
        let mut item = WorkItem::with_block(WorkOp::WriteNand, 3);
        for (i, b) in item.payload.iter_mut().enumerate() {
            *b = i as u8;
        }

        channel.requests.submit_blocking(item).await;
        worker.process_next().await;

        assert_eq!(worker.bus().page_bytes(3), item.payload.to_vec());
    }

    #[tokio::test]
    async fn test_flash_config() {
        let channel = Channel::new();
        let mut worker = worker(&channel, SimNand::new(0x0002_0030));

        channel
            .requests
            .submit_blocking(WorkItem::new(WorkOp::GetFlashConfig))
            .await;
        worker.process_next().await;

        let response = channel.responses.try_take().unwrap();
        assert_eq!(response.status, 0);
        assert_eq!(response.flash_config().raw(), 0x0002_0030);
    }

    #[tokio::test]
    async fn test_smc_start_stop_move_the_bus() {
        let channel = Channel::new();
        let mut worker = worker(&channel, SimNand::new(0));

        channel.requests.submit_blocking(WorkItem::new(WorkOp::StartSmc)).await;
        worker.process_next().await;
        assert!(!worker.bus().enabled);

        channel.requests.submit_blocking(WorkItem::new(WorkOp::StopSmc)).await;
        worker.process_next().await;
        assert!(worker.bus().enabled);
        assert!(!worker.bus().chip_select);
    }

    #[tokio::test]
    async fn test_emmc_operations() {
        let channel = Channel::new();
        let mut bus = SimEmmc::new();
        bus.sectors.insert(2, [0x0102_0304; 128]);
        let mut worker = worker(&channel, bus);

        for item in [
            WorkItem::new(WorkOp::InitEmmc),
            WorkItem::new(WorkOp::ReadCid),
            WorkItem::new(WorkOp::ReadCsd),
            WorkItem::new(WorkOp::ReadExtCsd),
            WorkItem::with_block(WorkOp::ReadEmmc, 2),
        ] {
            channel.requests.submit_blocking(item).await;
        }
        for _ in 0..5 {
            worker.process_next().await;
        }

        let init = channel.responses.try_take().unwrap();
        assert_eq!((init.op, init.status), (WorkOp::InitEmmc, 0));
        let cid = channel.responses.try_take().unwrap();
        assert_eq!(&cid.payload[..4], &[0x11, 0x11, 0x11, 0x11]);
        let csd = channel.responses.try_take().unwrap();
        assert_eq!(&csd.payload[..4], &[0x01, 0x00, 0xAA, 0xAA]);
        let ext_csd = channel.responses.try_take().unwrap();
        assert_eq!(&ext_csd.payload[8..12], &[2, 0, 0, 0]);
        let read = channel.responses.try_take().unwrap();
        assert_eq!(read.status, 0);
        assert_eq!(&read.payload[..4], &[0x04, 0x03, 0x02, 0x01]);
        assert!(channel.responses.is_empty());
    }

    #[tokio::test]
    async fn test_emmc_failure_status() {
        let channel = Channel::new();
        let mut bus = SimEmmc::new();
        bus.failing.insert(7);
        let mut worker = worker(&channel, bus);

        channel
            .requests
            .submit_blocking(WorkItem::with_block(WorkOp::ReadEmmc, 0))
            .await;
        worker.process_next().await;

        assert_eq!(channel.responses.try_take().unwrap().status, 0xFFFF_FFFF);
    }

    #[tokio::test]
    async fn test_responses_follow_request_order() {
        let channel = Channel::new();
        let mut worker = worker(&channel, SimNand::new(0));

        for lba in 0..8 {
            channel
                .requests
                .submit_blocking(WorkItem::with_block(WorkOp::ReadNand, lba))
                .await;
        }
        for _ in 0..8 {
            worker.process_next().await;
        }
        let offsets: Vec<u32> = core::iter::from_fn(|| channel.responses.try_take())
            .map(|item| item.block_offset)
            .collect();
        assert_eq!(offsets, (0..8).collect::<Vec<u32>>());
    }
}
