use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pipe::Pipe;
use embassy_sync::signal::Signal;
use picoflasher_core::work::queue::WorkChannel;

use crate::shared::constant::*;

/// Dispatcher (core0) <-> storage worker (core1)
pub static WORK_CHANNEL: WorkChannel<CriticalSectionRawMutex> = WorkChannel::new();

/// Bytes received from the host
pub static USB_RX_PIPE: Pipe<CriticalSectionRawMutex, USB_RX_PIPE_SIZE> = Pipe::new();

/// Bytes queued for the host
pub static USB_TX_PIPE: Pipe<CriticalSectionRawMutex, USB_TX_PIPE_SIZE> = Pipe::new();

/// Raised by the dispatcher at the end of each reply
pub static USB_TX_FLUSH: Signal<CriticalSectionRawMutex, ()> = Signal::new();
