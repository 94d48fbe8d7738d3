pub mod flash_config;
pub mod register_bus;
