pub mod compare;
pub mod config;
pub mod metrics;
pub mod report;
pub mod scenario;
pub mod thresholds;
pub mod worker;
