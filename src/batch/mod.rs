pub mod commands;
pub mod processor;

pub use processor::{default_batch_name, BatchProcessor};
