pub mod item;
pub mod queue;
pub mod worker;
