//! Repository structs, one per table.

mod analysis_repo;
mod audit_event_repo;

pub use analysis_repo::{AnalysisRepo, EXPORT_ROW_CAP};
pub use audit_event_repo::AuditEventRepo;
