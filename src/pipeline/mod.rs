//! Monitoring pipeline.
//!
//! - `Monitor::run_cycle`: one check of the publisher's listing
//! - `run_scheduler`: repeated checks until stopped
//! - `collect_status` / `self_test`: read-only inspection

pub mod cycle;
pub mod schedule;
pub mod status;

pub use cycle::{CycleOutcome, CyclePhase, CycleReport, Monitor, MonitorSettings};
pub use schedule::run_scheduler;
pub use status::{MonitorStatus, SelfTestReport, collect_status, self_test};
