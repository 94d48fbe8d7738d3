use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::host::transport::HostTransport;
use crate::work::item::{WorkItem, WorkOp, PAYLOAD_SIZE, SECTOR_SIZE};
use crate::work::queue::WorkChannel;

/// Status word preceding every streamed block
const STATUS_LEN: usize = 4;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamTarget {
    #[default]
    Nand,
    Emmc,
}

impl StreamTarget {
    /// Bytes sent per successful block
    pub fn block_len(&self) -> usize {
        match self {
            StreamTarget::Nand => PAYLOAD_SIZE,
            StreamTarget::Emmc => SECTOR_SIZE,
        }
    }

    fn read_op(&self) -> WorkOp {
        match self {
            StreamTarget::Nand => WorkOp::ReadNand,
            StreamTarget::Emmc => WorkOp::ReadEmmc,
        }
    }
}

/// Result of one pump step
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PumpOutcome {
    /// No session
    Idle,
    /// Every block was delivered, session closed
    Finished,
    /// Host side cannot take a whole block yet, nothing moved
    Stalled,
    Running,
    /// A block failed; its status was sent and the in-flight reads were discarded
    Aborted { status: u32 },
}

/// Look-ahead block read session.
///
/// Keeps the request queue topped up with reads and hands completed blocks to the host in
/// order. The only blocking wait is the drain after a failed block.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StreamingSession {
    active: bool,
    target: StreamTarget,
    next_to_submit: u32,
    next_to_deliver: u32,
    end_offset: u32,
}

impl StreamingSession {
    pub const fn new() -> Self {
        Self {
            active: false,
            target: StreamTarget::Nand,
            next_to_submit: 0,
            next_to_deliver: 0,
            end_offset: 0,
        }
    }

    /// Stream blocks `0..end_offset`
    pub fn start(&mut self, target: StreamTarget, end_offset: u32) {
        info!("stream start: target={} end={}", target, end_offset);
        *self = Self {
            active: true,
            target,
            next_to_submit: 0,
            next_to_deliver: 0,
            end_offset,
        };
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn target(&self) -> StreamTarget {
        self.target
    }

    pub fn next_to_submit(&self) -> u32 {
        self.next_to_submit
    }

    pub fn next_to_deliver(&self) -> u32 {
        self.next_to_deliver
    }

    /// One step of the pipeline: submit at most one read, deliver at most one block.
    pub async fn pump<M: RawMutex, T: HostTransport>(
        &mut self,
        channel: &WorkChannel<M>,
        transport: &mut T,
    ) -> PumpOutcome {
        if !self.active {
            return PumpOutcome::Idle;
        }
        if self.next_to_deliver >= self.end_offset {
            self.active = false;
            info!("stream finished: {} blocks", self.next_to_deliver);
            return PumpOutcome::Finished;
        }

        let block_len = self.target.block_len();
        if transport.write_available() < STATUS_LEN + block_len {
            return PumpOutcome::Stalled;
        }

        if !channel.requests.is_full() && self.next_to_submit < self.end_offset {
            let read = WorkItem::with_block(self.target.read_op(), self.next_to_submit);
            if channel.requests.submit(read) {
                self.next_to_submit += 1;
            }
        }

        let Some(item) = channel.responses.try_take() else {
            return PumpOutcome::Running;
        };
        self.next_to_deliver += 1;
        transport.write(&item.status.to_le_bytes()).await;
        if item.status == 0 {
            transport.write(&item.payload[..block_len]).await;
            transport.flush();
            return PumpOutcome::Running;
        }
        transport.flush();

        warn!(
            "stream aborted: lba={} status={:#x}",
            item.block_offset, item.status
        );
        self.active = false;
        while self.next_to_deliver < self.next_to_submit {
            let _ = channel.responses.take_blocking().await;
            self.next_to_deliver += 1;
        }
        PumpOutcome::Aborted {
            status: item.status,
        }
    }
}
