pub mod storage_task;
pub mod usb_task;
