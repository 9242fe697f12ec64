use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::storage::Storage;

/// 关闭超时时间（秒）
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// 后台任务与连接池，关闭时需要依次处理
pub struct ShutdownHandles {
    pub storage: Arc<Storage>,
    pub scheduler_tx: watch::Sender<bool>,
    pub scheduler_task: Option<JoinHandle<()>>,
}

/// 等待 Ctrl+C，然后在超时内停止调度器并关闭连接池
pub async fn listen_for_shutdown(handles: ShutdownHandles) {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, stopping background tasks...");
        }
        Err(e) => {
            warn!(
                "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
                e
            );
        }
    }

    let shutdown_result = timeout(
        Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
        perform_shutdown_tasks(handles),
    )
    .await;

    match shutdown_result {
        Ok(()) => {
            info!("All shutdown tasks completed successfully");
        }
        Err(_) => {
            error!(
                "Shutdown tasks timed out after {} seconds! Forcing exit.",
                SHUTDOWN_TIMEOUT_SECS
            );
            std::process::exit(1);
        }
    }
}

/// 执行所有关闭任务（在超时内调用）
pub async fn perform_shutdown_tasks(handles: ShutdownHandles) {
    let ShutdownHandles {
        storage,
        scheduler_tx,
        scheduler_task,
    } = handles;

    // 通知调度器退出，等待正在运行的 tick 结束
    let _ = scheduler_tx.send(true);
    if let Some(task) = scheduler_task
        && let Err(e) = task.await
    {
        error!("Report scheduler task ended abnormally: {}", e);
    }

    match storage.close().await {
        Ok(()) => info!("Database connections closed"),
        Err(e) => error!("Failed to close database connections: {}", e),
    }
}
