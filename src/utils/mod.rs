pub mod logging;
pub mod ids;
