pub mod analyze;
pub mod dashboard;
pub mod metrics;
pub mod patch;
pub mod report;
