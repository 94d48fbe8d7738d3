#![cfg_attr(not(test), no_std)]

// must stay first so the logging macros are visible to every module below
mod fmt;

pub mod common;
pub mod emmc;
pub mod host;
pub mod nand;
pub mod post;
pub mod smc;
pub mod work;

#[cfg(test)]
pub(crate) mod testing;
