//! Report scheduling: cron evaluation, generators and the polling loop.

pub mod cron;
pub mod generators;
pub mod runner;

pub use cron::CronSchedule;
pub use generators::{GeneratorRegistry, ReportContext, ReportGenerator};
pub use runner::{ReportScheduler, TickSummary};
