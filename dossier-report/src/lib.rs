pub mod findings;
pub mod generator;
pub mod render;

pub use findings::{gather, Finding, ReportData};
pub use generator::StubReportGenerator;
