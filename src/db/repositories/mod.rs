pub mod analyses;
pub mod audit_events;
pub mod batches;
pub mod calibrations;
pub mod piece_types;
pub mod reports;
