use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::common::flash_config::FlashConfig;
use crate::emmc::engine::CARD_REGISTER_SIZE;
use crate::host::frame::{frame_len, CommandId, FrameHeader, FRAME_HEADER_LEN};
use crate::host::stream::{PumpOutcome, StreamTarget, StreamingSession};
use crate::host::transport::{BootControl, HostTransport};
use crate::post::PostLog;
use crate::work::item::{WorkItem, WorkOp, PAYLOAD_SIZE, SECTOR_SIZE};
use crate::work::queue::WorkChannel;

/// Protocol version reported by `GetVersion`
pub const FIRMWARE_VERSION: u32 = 3;

/// Decodes host frames and turns them into work items.
///
/// Non-streaming commands are strictly request/response: the dispatcher waits for the
/// worker's answer before touching the next frame.
pub struct CommandDispatcher<'ch, M: RawMutex> {
    channel: &'ch WorkChannel<M>,
    session: StreamingSession,
    post_log: PostLog,
}

impl<'ch, M: RawMutex> CommandDispatcher<'ch, M> {
    pub fn new(channel: &'ch WorkChannel<M>) -> Self {
        Self {
            channel,
            session: StreamingSession::new(),
            post_log: PostLog::new(),
        }
    }

    pub fn session(&self) -> &StreamingSession {
        &self.session
    }

    pub fn post_log_mut(&mut self) -> &mut PostLog {
        &mut self.post_log
    }

    /// Round trip through the worker
    async fn request(&self, item: WorkItem) -> WorkItem {
        self.channel.requests.submit_blocking(item).await;
        self.channel.responses.take_blocking().await
    }

    async fn flash_config(&self) -> FlashConfig {
        self.request(WorkItem::new(WorkOp::GetFlashConfig))
            .await
            .flash_config()
    }

    /// Handle one frame if a complete one is buffered. Frames wait while a stream runs.
    ///
    /// Returns whether a frame was consumed.
    pub async fn poll_frame<T: HostTransport, R: BootControl>(
        &mut self,
        transport: &mut T,
        boot: &mut R,
    ) -> bool {
        if self.session.is_active() {
            return false;
        }
        let Some(command) = transport.peek() else {
            return false;
        };
        if transport.available() < frame_len(command) {
            return false;
        }

        let mut raw = [0u8; FRAME_HEADER_LEN];
        if transport.read(&mut raw) != FRAME_HEADER_LEN {
            return false;
        }
        let header = FrameHeader::parse(&raw);
        match CommandId::try_from(header.command) {
            Ok(id) => {
                debug!("command: {} lba={}", id, header.lba);
                self.dispatch(id, header.lba, transport, boot).await;
                transport.flush();
            }
            Err(_) => warn!("unknown command: {:#x}", header.command),
        }
        true
    }

    /// Advance the active stream, if any
    pub async fn pump_stream<T: HostTransport>(&mut self, transport: &mut T) -> PumpOutcome {
        self.session.pump(self.channel, transport).await
    }

    async fn dispatch<T: HostTransport, R: BootControl>(
        &mut self,
        id: CommandId,
        lba: u32,
        transport: &mut T,
        boot: &mut R,
    ) {
        match id {
            CommandId::GetVersion => transport.write(&FIRMWARE_VERSION.to_le_bytes()).await,
            CommandId::GetFlashConfig => {
                let config = self.flash_config().await;
                transport.write(&config.raw().to_le_bytes()).await;
            }
            CommandId::ReadFlash => {
                let item = self.request(WorkItem::with_block(WorkOp::ReadNand, lba)).await;
                write_block_reply(transport, &item, PAYLOAD_SIZE).await;
            }
            CommandId::WriteFlash => {
                let mut item = WorkItem::with_block(WorkOp::WriteNand, lba);
                transport.read(&mut item.payload);
                self.channel.requests.submit_blocking(item).await;
                // the worker has no reply path for writes
                transport.write(&0u32.to_le_bytes()).await;
            }
            CommandId::ReadFlashStream => self.session.start(StreamTarget::Nand, lba),
            CommandId::EmmcDetect => {
                let config = self.flash_config().await;
                transport.write(&[u8::from(config.is_emmc())]).await;
            }
            CommandId::EmmcInit => {
                let item = self.request(WorkItem::new(WorkOp::InitEmmc)).await;
                transport.write(&item.status.to_le_bytes()).await;
            }
            CommandId::EmmcGetCid => {
                let item = self.request(WorkItem::new(WorkOp::ReadCid)).await;
                transport.write(&item.payload[..CARD_REGISTER_SIZE]).await;
            }
            CommandId::EmmcGetCsd => {
                let item = self.request(WorkItem::new(WorkOp::ReadCsd)).await;
                transport.write(&item.payload[..CARD_REGISTER_SIZE]).await;
            }
            CommandId::EmmcGetExtCsd => {
                let item = self.request(WorkItem::new(WorkOp::ReadExtCsd)).await;
                transport.write(&item.payload[..SECTOR_SIZE]).await;
            }
            CommandId::EmmcRead => {
                let item = self.request(WorkItem::with_block(WorkOp::ReadEmmc, lba)).await;
                write_block_reply(transport, &item, SECTOR_SIZE).await;
            }
            CommandId::EmmcReadStream => self.session.start(StreamTarget::Emmc, lba),
            CommandId::EmmcWrite => {
                let mut item = WorkItem::with_block(WorkOp::WriteEmmc, lba);
                transport.read(&mut item.payload[..SECTOR_SIZE]);
                self.channel.requests.submit_blocking(item).await;
                transport.write(&0u32.to_le_bytes()).await;
            }
            CommandId::GetPost => {
                let (first, second) = self.post_log.as_slices();
                transport.write(&[self.post_log.len()]).await;
                transport.write(first).await;
                if !second.is_empty() {
                    transport.write(second).await;
                }
                self.post_log.clear();
            }
            CommandId::StartSmc => {
                self.channel
                    .requests
                    .submit_blocking(WorkItem::new(WorkOp::StartSmc))
                    .await
            }
            CommandId::StopSmc => {
                self.channel
                    .requests
                    .submit_blocking(WorkItem::new(WorkOp::StopSmc))
                    .await
            }
            CommandId::RebootToBootloader => {
                info!("rebooting to bootloader");
                boot.reboot_to_bootloader()
            }
        }
    }
}

/// Status word, then the block when it succeeded
async fn write_block_reply<T: HostTransport>(transport: &mut T, item: &WorkItem, len: usize) {
    transport.write(&item.status.to_le_bytes()).await;
    if item.status == 0 {
        transport.write(&item.payload[..len]).await;
    }
}
