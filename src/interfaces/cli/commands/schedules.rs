//! schedules tick command

use std::sync::Arc;

use chrono::Utc;
use colored::Colorize;

use crate::config::get_config;
use crate::interfaces::cli::CliError;
use crate::scheduler::{GeneratorRegistry, ReportScheduler};
use crate::storage::Storage;

/// 手动运行一次调度（运维排障用）
pub async fn tick_once(storage: Arc<Storage>) -> Result<(), CliError> {
    let config = get_config();
    let generators = Arc::new(GeneratorRegistry::with_defaults(storage.clone()));
    let scheduler = ReportScheduler::new(storage, generators, config.scheduler.clone());

    let summary = scheduler.tick(Utc::now()).await?;
    println!("{}", "Scheduler tick finished:".bold().green());
    println!("  {:<10} {}", "recovered", summary.recovered.to_string().yellow());
    println!("  {:<10} {}", "enqueued", summary.enqueued);
    println!("  {:<10} {}", "claimed", summary.claimed);
    println!("  {:<10} {}", "completed", summary.completed.to_string().green());
    println!("  {:<10} {}", "retried", summary.retried.to_string().yellow());
    println!("  {:<10} {}", "failed", summary.failed.to_string().red());
    println!("  {:<10} {}", "paused", summary.paused.to_string().red());
    Ok(())
}
