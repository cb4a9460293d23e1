pub mod connection;
pub mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use connection::Database;
pub use models::*;
pub use repositories::analyses::{MAX_STORED_ANALYSES, SEED_ANALYSES};
pub use repositories::batches::MAX_STORED_BATCHES;
