pub mod analyze;
pub mod format;
pub mod generate;
pub mod orchestrator;
pub mod retrieve;

pub use format::AnalyticsReport;
pub use orchestrator::{Models, ReportRequest, build_report, generate_report};
