pub mod engine;
pub mod status;
