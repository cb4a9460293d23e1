pub mod analysis;
pub mod audit;
pub mod batch;
pub mod calibration;
pub mod piece_type;
pub mod report;

pub use analysis::{AnalysisQuery, AnalysisStatus, CorrosionAnalysis, Page, RegionOfInterest};
pub use audit::{AuditAction, AuditEvent, AuditQuery};
pub use batch::{BatchProcessing, BatchStatus, StatusSummary};
pub use calibration::{CalibrationProfile, CalibrationProfileInput};
pub use piece_type::{PieceType, PieceTypeInput, PieceTypePatch};
pub use report::{BatchCorrosion, DailyCorrosion};
