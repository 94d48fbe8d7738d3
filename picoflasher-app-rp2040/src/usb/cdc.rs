use embassy_futures::select::{select, Either};
use embassy_rp::peripherals::USB;
use embassy_rp::usb::Driver;
use embassy_usb::class::cdc_acm::{Receiver, Sender};
use embassy_usb::driver::EndpointError;
use embassy_usb::Handler;
use heapless::Deque;
use picoflasher_core::host::transport::HostTransport;
use picoflasher_core::work::item::{WorkItem, WorkOp};

use crate::shared::constant::*;
use crate::shared::resource::{USB_RX_PIPE, USB_TX_FLUSH, USB_TX_PIPE, WORK_CHANNEL};

/// Host side of the dispatcher: bytes move through the RX/TX pipes filled by the CDC loops.
///
/// Received bytes are staged locally so a whole frame can be measured and peeked before it
/// is consumed.
pub struct UsbSerialPort {
    staging: Deque<u8, HOST_STAGING_SIZE>,
}

impl UsbSerialPort {
    pub const fn new() -> Self {
        Self {
            staging: Deque::new(),
        }
    }

    fn refill(&mut self) {
        let mut chunk = [0u8; USB_MAX_PACKET_SIZE];
        loop {
            let room = (self.staging.capacity() - self.staging.len()).min(chunk.len());
            if room == 0 {
                break;
            }
            let Ok(count) = USB_RX_PIPE.try_read(&mut chunk[..room]) else {
                break;
            };
            for byte in &chunk[..count] {
                let _ = self.staging.push_back(*byte);
            }
        }
    }
}

impl HostTransport for UsbSerialPort {
    fn available(&mut self) -> usize {
        self.refill();
        self.staging.len()
    }

    fn peek(&mut self) -> Option<u8> {
        self.refill();
        self.staging.front().copied()
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        self.refill();
        let mut count = 0;
        for slot in buf.iter_mut() {
            let Some(byte) = self.staging.pop_front() else {
                break;
            };
            *slot = byte;
            count += 1;
        }
        count
    }

    fn write_available(&self) -> usize {
        USB_TX_PIPE.free_capacity()
    }

    async fn write(&mut self, data: &[u8]) {
        USB_TX_PIPE.write_all(data).await;
    }

    fn flush(&mut self) {
        USB_TX_FLUSH.signal(());
    }
}

/// OUT endpoint -> RX pipe
pub async fn rx_loop<'d>(mut receiver: Receiver<'d, Driver<'d, USB>>) {
    let mut packet = [0u8; USB_MAX_PACKET_SIZE];
    loop {
        receiver.wait_connection().await;
        crate::info!("CDC connected");
        loop {
            match receiver.read_packet(&mut packet).await {
                Ok(count) => USB_RX_PIPE.write_all(&packet[..count]).await,
                Err(EndpointError::BufferOverflow) => crate::warn!("CDC rx overflow"),
                Err(EndpointError::Disabled) => break,
            }
        }
        crate::info!("CDC disconnected");
    }
}

/// TX pipe -> IN endpoint. Packets go out as soon as bytes are queued; on flush, a reply
/// that ended on a full packet is closed with a ZLP.
pub async fn tx_loop<'d>(mut sender: Sender<'d, Driver<'d, USB>>) {
    let mut packet = [0u8; USB_MAX_PACKET_SIZE];
    loop {
        sender.wait_connection().await;
        let mut last_full = false;
        let mut flush_pending = false;
        loop {
            match select(USB_TX_PIPE.read(&mut packet), USB_TX_FLUSH.wait()).await {
                Either::First(count) => {
                    if sender.write_packet(&packet[..count]).await.is_err() {
                        break;
                    }
                    last_full = count == USB_MAX_PACKET_SIZE;
                }
                Either::Second(()) => flush_pending = true,
            }
            if flush_pending && USB_TX_PIPE.is_empty() {
                flush_pending = false;
                if last_full && sender.write_packet(&[]).await.is_err() {
                    break;
                }
                last_full = false;
            }
        }
        // nobody will read what is left
        USB_TX_PIPE.clear();
        USB_TX_FLUSH.reset();
    }
}

/// Hands the bus back to the console when the host goes away
pub struct UsbLifecycle;

impl UsbLifecycle {
    fn release_console(reason: &str) {
        crate::info!("USB {}: starting SMC", reason);
        if !WORK_CHANNEL.requests.submit(WorkItem::new(WorkOp::StartSmc)) {
            crate::warn!("work queue full, SMC start dropped");
        }
    }
}

impl Handler for UsbLifecycle {
    fn configured(&mut self, configured: bool) {
        if configured {
            crate::info!("USB configured");
        } else {
            Self::release_console("unconfigured");
        }
    }

    fn suspended(&mut self, suspended: bool) {
        if suspended {
            Self::release_console("suspended");
        }
    }
}
