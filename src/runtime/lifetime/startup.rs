use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::get_config;
use crate::scheduler::ReportScheduler;
use crate::services::AppServices;
use crate::storage::{Storage, StorageFactory};

pub struct StartupContext {
    pub storage: Arc<Storage>,
    pub services: AppServices,
    /// `scheduler.enabled = false` 时为 None
    pub scheduler: Option<Arc<ReportScheduler>>,
}

/// 准备服务器启动的上下文
/// 包括存储（含迁移）、服务集合与报告调度器
pub async fn prepare_server_startup() -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    let config = get_config();

    let storage = StorageFactory::create()
        .await
        .context("Failed to create storage backend")?;
    info!("Using storage backend: {}", storage.backend_name());

    if config.auth.jwt_secret.is_empty() {
        warn!("auth.jwt_secret is empty: tokens will not survive a restart");
    }
    if config.webhook.secret.as_deref().is_none_or(str::is_empty) {
        warn!("webhook.secret is not set: fulfillment webhook endpoint is disabled");
    }
    if config.ai.api_key.as_deref().is_none_or(str::is_empty) {
        warn!("ai.api_key is not set: chat messages will return 503");
    }

    let services = AppServices::new(storage.clone(), &config);
    debug!(
        "Registered report generators: {:?}",
        services.generators.report_types()
    );

    let scheduler = if config.scheduler.enabled {
        Some(Arc::new(ReportScheduler::new(
            storage.clone(),
            services.generators.clone(),
            config.scheduler.clone(),
        )))
    } else {
        warn!("Report scheduler is disabled by configuration");
        None
    };

    info!(
        "Pre-startup processing completed in {:?}",
        start_time.elapsed()
    );

    Ok(StartupContext {
        storage,
        services,
        scheduler,
    })
}
