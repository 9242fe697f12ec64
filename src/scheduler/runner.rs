//! Report scheduler loop
//!
//! 单进程轮询：把到期的调度排队为执行记录，条件更新抢占执行，运行生成器，
//! 再按结果完成、退避重试或标记失败。连续失败达到阈值的调度会被自动暂停，
//! 同时开启一个 high 级别的 escalation。

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::errors::{Result, SeoHubError};
use crate::services::escalation_service::{SystemEscalation, open_system_escalation};
use crate::services::report_service::enqueue_execution;
use crate::storage::Storage;
use crate::storage::backend::retry::{exponential_delay, with_retry};
use crate::storage::models::{EscalationSeverity, ExecutionStatus, ScheduleStatus, TriggerKind};
use migration::entities::{report_execution, report_schedule};

use super::cron::CronSchedule;
use super::generators::{GeneratorRegistry, ReportContext};

/// 一次 tick 的统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    pub recovered: u64,
    pub enqueued: usize,
    pub claimed: usize,
    pub completed: usize,
    pub retried: usize,
    pub failed: usize,
    pub paused: usize,
}

enum RunOutcome {
    Completed,
    Retried,
    Failed { paused: bool },
}

pub struct ReportScheduler {
    storage: Arc<Storage>,
    generators: Arc<GeneratorRegistry>,
    config: SchedulerConfig,
}

impl ReportScheduler {
    pub fn new(
        storage: Arc<Storage>,
        generators: Arc<GeneratorRegistry>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            storage,
            generators,
            config,
        }
    }

    /// 失败第 `attempts` 次后的重试间隔
    pub fn retry_delay(&self, attempts: i32) -> Duration {
        let secs = exponential_delay(
            std::cmp::Ord::max(attempts, 1) as u32,
            self.config.retry_base_delay_secs,
            self.config.retry_max_delay_secs,
        );
        Duration::seconds(secs as i64)
    }

    /// 一轮调度：回收卡住的执行，排队到期调度，领取并运行
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickSummary> {
        let mut summary = TickSummary {
            recovered: self.recover_stale(now).await?,
            enqueued: self.enqueue_due(now).await?,
            ..Default::default()
        };

        for execution in self.claim_batch(now).await? {
            summary.claimed += 1;
            let execution_id = execution.id.clone();
            match self.run_execution(execution, now).await {
                Ok(RunOutcome::Completed) => summary.completed += 1,
                Ok(RunOutcome::Retried) => summary.retried += 1,
                Ok(RunOutcome::Failed { paused }) => {
                    summary.failed += 1;
                    if paused {
                        summary.paused += 1;
                    }
                }
                Err(e) => error!("Failed to record outcome of execution {}: {}", execution_id, e),
            }
        }

        if summary != TickSummary::default() {
            info!("Report scheduler tick: {:?}", summary);
        }
        Ok(summary)
    }

    /// 为到期的 active 调度排队；错过的多次运行合并为一次
    async fn enqueue_due(&self, now: DateTime<Utc>) -> Result<usize> {
        let db = self.storage.get_db();
        let due = report_schedule::Entity::find()
            .filter(report_schedule::Column::Status.eq(ScheduleStatus::Active.as_ref()))
            .filter(report_schedule::Column::NextRunAt.lte(now))
            .order_by_asc(report_schedule::Column::NextRunAt)
            .all(db)
            .await?;

        let mut enqueued = 0;
        for schedule in due {
            let Some(due_at) = schedule.next_run_at else {
                continue;
            };
            let next = match CronSchedule::parse(&schedule.cron_expression) {
                Ok(cron) => cron.next_after(now),
                Err(e) => {
                    warn!("Schedule {} has an invalid cron expression: {}", schedule.id, e);
                    None
                }
            };

            let txn = db.begin().await?;
            // 以 next_run_at 作为乐观锁，另一个 worker 抢先时影响行数为 0
            let advanced = report_schedule::Entity::update_many()
                .col_expr(report_schedule::Column::NextRunAt, Expr::value(next))
                .col_expr(report_schedule::Column::UpdatedAt, Expr::value(now))
                .filter(report_schedule::Column::Id.eq(schedule.id.as_str()))
                .filter(report_schedule::Column::NextRunAt.eq(due_at))
                .exec(&txn)
                .await?;
            if advanced.rows_affected == 0 {
                txn.rollback().await?;
                continue;
            }
            enqueue_execution(&txn, &schedule, TriggerKind::Scheduled, due_at, now).await?;
            txn.commit().await?;

            debug!("Schedule {} due at {} enqueued, next {:?}", schedule.id, due_at, next);
            enqueued += 1;
        }
        Ok(enqueued)
    }

    async fn claim_batch(&self, now: DateTime<Utc>) -> Result<Vec<report_execution::Model>> {
        let db = self.storage.get_db();
        let candidates = report_execution::Entity::find()
            .filter(report_execution::Column::Status.eq(ExecutionStatus::Queued.as_ref()))
            .filter(
                Condition::any()
                    .add(report_execution::Column::NextAttemptAt.is_null())
                    .add(report_execution::Column::NextAttemptAt.lte(now)),
            )
            .order_by_asc(report_execution::Column::CreatedAt)
            .limit(std::cmp::Ord::max(self.config.batch_size, 1))
            .all(db)
            .await?;

        let mut claimed = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if self.claim(&candidate.id, now).await? {
                if let Some(fresh) = report_execution::Entity::find_by_id(candidate.id.clone())
                    .one(db)
                    .await?
                {
                    claimed.push(fresh);
                }
            } else {
                debug!("Execution {} claimed by another worker", candidate.id);
            }
        }
        Ok(claimed)
    }

    /// queued → running 的条件更新；返回是否抢到
    async fn claim(&self, execution_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let db = self.storage.get_db();
        let res = with_retry("scheduler.claim", self.storage.retry_config(), || async {
            report_execution::Entity::update_many()
                .col_expr(
                    report_execution::Column::Status,
                    Expr::value(ExecutionStatus::Running.to_string()),
                )
                .col_expr(
                    report_execution::Column::Attempts,
                    Expr::col(report_execution::Column::Attempts).add(1),
                )
                .col_expr(report_execution::Column::StartedAt, Expr::value(Some(now)))
                .filter(report_execution::Column::Id.eq(execution_id))
                .filter(report_execution::Column::Status.eq(ExecutionStatus::Queued.as_ref()))
                .exec(db)
                .await
        })
        .await?;
        Ok(res.rows_affected == 1)
    }

    async fn run_execution(
        &self,
        execution: report_execution::Model,
        now: DateTime<Utc>,
    ) -> Result<RunOutcome> {
        let db = self.storage.get_db();
        let schedule = report_schedule::Entity::find_by_id(execution.schedule_id.clone())
            .one(db)
            .await?;

        let Some(schedule) = schedule else {
            warn!(
                "Execution {} references missing schedule {}",
                execution.id, execution.schedule_id
            );
            let mut model = execution.into_active_model();
            model.status = Set(ExecutionStatus::Failed.to_string());
            model.error = Set(Some("schedule no longer exists".to_string()));
            model.finished_at = Set(Some(now));
            model.update(db).await?;
            return Ok(RunOutcome::Failed { paused: false });
        };

        let generated = match self.generators.get(&schedule.report_type) {
            Some(generator) => {
                let ctx = ReportContext::new(
                    &schedule.agency_id,
                    &schedule.id,
                    &schedule.name,
                    schedule.last_run_at,
                    now,
                );
                generator.generate(&ctx).await
            }
            None => Err(SeoHubError::invalid_state(format!(
                "no generator registered for report type '{}'",
                schedule.report_type
            ))),
        };

        match generated {
            Ok(result) => {
                self.complete(execution, schedule, result, now).await?;
                Ok(RunOutcome::Completed)
            }
            Err(e) => self.record_failure(execution, schedule, e, now).await,
        }
    }

    async fn complete(
        &self,
        execution: report_execution::Model,
        schedule: report_schedule::Model,
        result: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let txn = self.storage.get_db().begin().await?;

        let execution_id = execution.id.clone();
        let mut exec = execution.into_active_model();
        exec.status = Set(ExecutionStatus::Completed.to_string());
        exec.result = Set(Some(serde_json::to_string(&result)?));
        exec.error = Set(None);
        exec.next_attempt_at = Set(None);
        exec.finished_at = Set(Some(now));
        exec.update(&txn).await?;

        let mut sched = schedule.into_active_model();
        sched.last_run_at = Set(Some(now));
        sched.failure_count = Set(0);
        sched.last_error = Set(None);
        sched.updated_at = Set(now);
        sched.update(&txn).await?;

        txn.commit().await?;
        info!("Report execution {} completed", execution_id);
        Ok(())
    }

    async fn record_failure(
        &self,
        execution: report_execution::Model,
        schedule: report_schedule::Model,
        err: SeoHubError,
        now: DateTime<Utc>,
    ) -> Result<RunOutcome> {
        let message = err.message().to_string();
        let execution_id = execution.id.clone();
        let attempts = execution.attempts;

        if attempts < execution.max_attempts {
            let retry_at = now + self.retry_delay(attempts);
            let mut exec = execution.into_active_model();
            exec.status = Set(ExecutionStatus::Queued.to_string());
            exec.error = Set(Some(message.clone()));
            exec.next_attempt_at = Set(Some(retry_at));
            exec.update(self.storage.get_db()).await?;
            warn!(
                "Report execution {} failed (attempt {}): {}; retry at {}",
                execution_id, attempts, message, retry_at
            );
            return Ok(RunOutcome::Retried);
        }

        let txn = self.storage.get_db().begin().await?;

        let mut exec = execution.into_active_model();
        exec.status = Set(ExecutionStatus::Failed.to_string());
        exec.error = Set(Some(message.clone()));
        exec.next_attempt_at = Set(None);
        exec.finished_at = Set(Some(now));
        exec.update(&txn).await?;

        let failure_count = schedule.failure_count + 1;
        let should_pause = failure_count >= schedule.max_failures
            && schedule.status == ScheduleStatus::Active.as_ref();
        let schedule_id = schedule.id.clone();
        let agency_id = schedule.agency_id.clone();
        let schedule_name = schedule.name.clone();

        let mut sched = schedule.into_active_model();
        sched.failure_count = Set(failure_count);
        sched.last_error = Set(Some(message.clone()));
        sched.updated_at = Set(now);
        if should_pause {
            sched.status = Set(ScheduleStatus::Paused.to_string());
            sched.paused_reason = Set(Some(format!(
                "auto-paused after {} consecutive failed runs",
                failure_count
            )));
            sched.paused_at = Set(Some(now));
        }
        sched.update(&txn).await?;

        if should_pause {
            open_system_escalation(
                &txn,
                SystemEscalation {
                    agency_id: &agency_id,
                    request_id: None,
                    schedule_id: Some(&schedule_id),
                    subject: format!("Report schedule '{}' was paused", schedule_name),
                    details: Some(format!(
                        "{} consecutive runs failed. Last error: {}",
                        failure_count, message
                    )),
                    severity: EscalationSeverity::High,
                },
            )
            .await?;
        }

        txn.commit().await?;

        error!(
            "Report execution {} failed permanently after {} attempts: {}",
            execution_id, attempts, message
        );
        if should_pause {
            warn!(
                "Report schedule {} auto-paused after {} consecutive failures",
                schedule_id, failure_count
            );
        }
        Ok(RunOutcome::Failed {
            paused: should_pause,
        })
    }

    /// 把崩溃或记录失败遗留的 running 执行放回队列
    pub async fn recover_stale(&self, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = now - Duration::seconds(self.config.stale_after_secs as i64);
        let res = report_execution::Entity::update_many()
            .col_expr(
                report_execution::Column::Status,
                Expr::value(ExecutionStatus::Queued.to_string()),
            )
            .col_expr(
                report_execution::Column::NextAttemptAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(report_execution::Column::Status.eq(ExecutionStatus::Running.as_ref()))
            .filter(report_execution::Column::StartedAt.lt(cutoff))
            .exec(self.storage.get_db())
            .await?;

        if res.rows_affected > 0 {
            warn!(
                "Recovered {} stale report executions (running since before {})",
                res.rows_affected, cutoff
            );
        }
        Ok(res.rows_affected)
    }

    /// 启动后台轮询任务，收到 shutdown 信号后退出
    pub fn spawn_background_task(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let interval = StdDuration::from_secs(std::cmp::Ord::max(self.config.tick_interval_secs, 1));
        info!(
            "Report scheduler started (tick interval: {}s, batch size: {})",
            interval.as_secs(),
            self.config.batch_size
        );

        tokio::spawn(async move {
            loop {
                if let Err(e) = self.tick(Utc::now()).await {
                    error!("Report scheduler tick failed: {}", e);
                }

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown.changed() => break,
                }
                if *shutdown.borrow() {
                    break;
                }
            }
            info!("Report scheduler stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_is_exponential_and_capped() {
        let config = SchedulerConfig {
            retry_base_delay_secs: 60,
            retry_max_delay_secs: 300,
            ..SchedulerConfig::default()
        };
        let delays: Vec<i64> = [1, 2, 3, 4]
            .iter()
            .map(|a| exponential_delay(*a, config.retry_base_delay_secs, config.retry_max_delay_secs) as i64)
            .collect();
        assert_eq!(delays, vec![60, 120, 240, 300]);
    }
}
