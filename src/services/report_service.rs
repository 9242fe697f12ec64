//! Report schedules and their executions
//!
//! 调度器循环本身在 `crate::scheduler::runner`；这里是面向用户的 CRUD、
//! 暂停/恢复、手动运行与失败重试。

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::get_config;
use crate::errors::{Result, SeoHubError};
use crate::scheduler::cron::validate_expression;
use crate::scheduler::generators::GeneratorRegistry;
use crate::storage::Storage;
use crate::storage::models::{
    ExecutionStatus, PageRequest, Paginated, ScheduleStatus, TriggerKind, parse_enum,
};
use crate::utils::new_id;
use crate::utils::validation::{normalize_email, require_text};
use migration::entities::{report_execution, report_schedule};

use super::Actor;

pub const MAX_RECIPIENTS: usize = 20;
pub const MAX_SCHEDULE_NAME_CHARS: usize = 120;
const MAX_FAILURES_LIMIT: i32 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateScheduleInput {
    pub name: String,
    pub report_type: String,
    pub cron_expression: String,
    #[serde(default)]
    pub recipients: Vec<String>,
    pub max_failures: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateScheduleInput {
    pub name: Option<String>,
    pub cron_expression: Option<String>,
    pub recipients: Option<Vec<String>>,
    pub max_failures: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleView {
    pub id: String,
    pub name: String,
    pub report_type: String,
    pub cron_expression: String,
    pub recipients: Vec<String>,
    pub status: String,
    pub paused_reason: Option<String>,
    pub paused_at: Option<DateTime<Utc>>,
    pub failure_count: i32,
    pub max_failures: i32,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<report_schedule::Model> for ScheduleView {
    fn from(m: report_schedule::Model) -> Self {
        Self {
            recipients: decode_recipients(&m.recipients),
            id: m.id,
            name: m.name,
            report_type: m.report_type,
            cron_expression: m.cron_expression,
            status: m.status,
            paused_reason: m.paused_reason,
            paused_at: m.paused_at,
            failure_count: m.failure_count,
            max_failures: m.max_failures,
            last_run_at: m.last_run_at,
            next_run_at: m.next_run_at,
            last_error: m.last_error,
            created_by: m.created_by,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionView {
    pub id: String,
    pub schedule_id: String,
    pub trigger: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub scheduled_for: DateTime<Utc>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub result: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<report_execution::Model> for ExecutionView {
    fn from(m: report_execution::Model) -> Self {
        Self {
            result: m
                .result
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok()),
            id: m.id,
            schedule_id: m.schedule_id,
            trigger: m.trigger_kind,
            status: m.status,
            attempts: m.attempts,
            max_attempts: m.max_attempts,
            scheduled_for: m.scheduled_for,
            next_attempt_at: m.next_attempt_at,
            started_at: m.started_at,
            finished_at: m.finished_at,
            error: m.error,
            created_at: m.created_at,
        }
    }
}

fn decode_recipients(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// 规范化邮箱并去重（保留首次出现的顺序）
fn clean_recipients(recipients: Vec<String>) -> Result<Vec<String>> {
    if recipients.len() > MAX_RECIPIENTS {
        return Err(SeoHubError::validation(format!(
            "at most {} recipients are allowed",
            MAX_RECIPIENTS
        )));
    }
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(recipients.len());
    for r in recipients {
        let email = normalize_email(&r)?;
        if seen.insert(email.clone()) {
            out.push(email);
        }
    }
    Ok(out)
}

fn check_max_failures(value: i32) -> Result<i32> {
    if (1..=MAX_FAILURES_LIMIT).contains(&value) {
        Ok(value)
    } else {
        Err(SeoHubError::validation(format!(
            "max_failures must be between 1 and {}",
            MAX_FAILURES_LIMIT
        )))
    }
}

/// 排队一条执行记录
pub async fn enqueue_execution<C: ConnectionTrait>(
    db: &C,
    schedule: &report_schedule::Model,
    trigger: TriggerKind,
    scheduled_for: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<report_execution::Model> {
    let model = report_execution::ActiveModel {
        id: Set(new_id()),
        schedule_id: Set(schedule.id.clone()),
        agency_id: Set(schedule.agency_id.clone()),
        trigger_kind: Set(trigger.to_string()),
        status: Set(ExecutionStatus::Queued.to_string()),
        attempts: Set(0),
        max_attempts: Set(get_config().scheduler.max_attempts.max(1)),
        scheduled_for: Set(scheduled_for),
        next_attempt_at: Set(None),
        started_at: Set(None),
        finished_at: Set(None),
        error: Set(None),
        result: Set(None),
        created_at: Set(now),
    };
    Ok(model.insert(db).await?)
}

/// paused → active：清零失败计数并从 `now` 重新计算下次运行时间（不补跑）
async fn resume_schedule_model<C: ConnectionTrait>(
    db: &C,
    schedule: report_schedule::Model,
    now: DateTime<Utc>,
) -> Result<report_schedule::Model> {
    let cron = validate_expression(&schedule.cron_expression, now)?;
    let mut model = schedule.into_active_model();
    model.status = Set(ScheduleStatus::Active.to_string());
    model.failure_count = Set(0);
    model.paused_reason = Set(None);
    model.paused_at = Set(None);
    model.next_run_at = Set(cron.next_after(now));
    model.updated_at = Set(now);
    Ok(model.update(db).await?)
}

pub struct ReportService {
    storage: Arc<Storage>,
    generators: Arc<GeneratorRegistry>,
}

impl ReportService {
    pub fn new(storage: Arc<Storage>, generators: Arc<GeneratorRegistry>) -> Self {
        Self {
            storage,
            generators,
        }
    }

    async fn find_schedule<C: ConnectionTrait>(
        db: &C,
        agency_id: &str,
        id: &str,
    ) -> Result<report_schedule::Model> {
        report_schedule::Entity::find_by_id(id.to_string())
            .filter(report_schedule::Column::AgencyId.eq(agency_id))
            .one(db)
            .await?
            .ok_or_else(|| SeoHubError::not_found(format!("Schedule '{}' not found", id)))
    }

    async fn find_execution<C: ConnectionTrait>(
        db: &C,
        agency_id: &str,
        id: &str,
    ) -> Result<report_execution::Model> {
        report_execution::Entity::find_by_id(id.to_string())
            .filter(report_execution::Column::AgencyId.eq(agency_id))
            .one(db)
            .await?
            .ok_or_else(|| SeoHubError::not_found(format!("Execution '{}' not found", id)))
    }

    pub async fn create(&self, actor: &Actor, input: CreateScheduleInput) -> Result<ScheduleView> {
        let now = Utc::now();
        let name = require_text("name", &input.name, MAX_SCHEDULE_NAME_CHARS)?;
        let report_type = input.report_type.trim().to_string();
        if !self.generators.contains(&report_type) {
            return Err(SeoHubError::validation(format!(
                "unknown report_type '{}' (expected one of: {})",
                report_type,
                self.generators.report_types().join(", ")
            )));
        }
        let cron = validate_expression(&input.cron_expression, now)?;
        let recipients = clean_recipients(input.recipients)?;
        let max_failures = check_max_failures(
            input
                .max_failures
                .unwrap_or(get_config().scheduler.pause_after_failures),
        )?;

        let model = report_schedule::ActiveModel {
            id: Set(new_id()),
            agency_id: Set(actor.agency_id.clone()),
            name: Set(name),
            report_type: Set(report_type),
            cron_expression: Set(cron.expression().to_string()),
            recipients: Set(serde_json::to_string(&recipients)?),
            status: Set(ScheduleStatus::Active.to_string()),
            paused_reason: Set(None),
            paused_at: Set(None),
            failure_count: Set(0),
            max_failures: Set(max_failures),
            last_run_at: Set(None),
            next_run_at: Set(cron.next_after(now)),
            last_error: Set(None),
            created_by: Set(actor.user_id.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(self.storage.get_db()).await?;
        info!(
            "Report schedule {} created ({} '{}'), next run {:?}",
            created.id, created.report_type, created.cron_expression, created.next_run_at
        );
        Ok(created.into())
    }

    pub async fn list(&self, agency_id: &str) -> Result<Vec<ScheduleView>> {
        let rows = report_schedule::Entity::find()
            .filter(report_schedule::Column::AgencyId.eq(agency_id))
            .order_by_desc(report_schedule::Column::CreatedAt)
            .all(self.storage.get_db())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get(&self, agency_id: &str, id: &str) -> Result<ScheduleView> {
        Ok(Self::find_schedule(self.storage.get_db(), agency_id, id)
            .await?
            .into())
    }

    pub async fn update(
        &self,
        agency_id: &str,
        id: &str,
        input: UpdateScheduleInput,
    ) -> Result<ScheduleView> {
        let now = Utc::now();
        let current = Self::find_schedule(self.storage.get_db(), agency_id, id).await?;
        let status: ScheduleStatus = parse_enum("status", &current.status)?;

        let mut model = current.into_active_model();
        if let Some(name) = input.name {
            model.name = Set(require_text("name", &name, MAX_SCHEDULE_NAME_CHARS)?);
        }
        if let Some(expr) = input.cron_expression {
            let cron = validate_expression(&expr, now)?;
            model.cron_expression = Set(cron.expression().to_string());
            if status == ScheduleStatus::Active {
                model.next_run_at = Set(cron.next_after(now));
            }
        }
        if let Some(recipients) = input.recipients {
            model.recipients = Set(serde_json::to_string(&clean_recipients(recipients)?)?);
        }
        if let Some(max_failures) = input.max_failures {
            model.max_failures = Set(check_max_failures(max_failures)?);
        }
        model.updated_at = Set(now);

        Ok(model.update(self.storage.get_db()).await?.into())
    }

    /// 删除调度及其全部执行记录
    pub async fn delete(&self, agency_id: &str, id: &str) -> Result<()> {
        let txn = self.storage.get_db().begin().await?;
        let schedule = Self::find_schedule(&txn, agency_id, id).await?;
        report_execution::Entity::delete_many()
            .filter(report_execution::Column::ScheduleId.eq(schedule.id.as_str()))
            .exec(&txn)
            .await?;
        report_schedule::Entity::delete_by_id(schedule.id)
            .exec(&txn)
            .await?;
        txn.commit().await?;
        info!("Report schedule {} deleted", id);
        Ok(())
    }

    pub async fn pause(&self, agency_id: &str, id: &str, reason: Option<String>) -> Result<ScheduleView> {
        let current = Self::find_schedule(self.storage.get_db(), agency_id, id).await?;
        let status: ScheduleStatus = parse_enum("status", &current.status)?;
        if status == ScheduleStatus::Paused {
            return Err(SeoHubError::invalid_state(format!(
                "Schedule '{}' is already paused",
                id
            )));
        }

        let now = Utc::now();
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| "paused manually".to_string());
        let mut model = current.into_active_model();
        model.status = Set(ScheduleStatus::Paused.to_string());
        model.paused_reason = Set(Some(reason));
        model.paused_at = Set(Some(now));
        model.updated_at = Set(now);
        let updated = model.update(self.storage.get_db()).await?;
        info!("Report schedule {} paused", id);
        Ok(updated.into())
    }

    pub async fn resume(&self, agency_id: &str, id: &str) -> Result<ScheduleView> {
        let current = Self::find_schedule(self.storage.get_db(), agency_id, id).await?;
        let status: ScheduleStatus = parse_enum("status", &current.status)?;
        if status == ScheduleStatus::Active {
            return Err(SeoHubError::invalid_state(format!(
                "Schedule '{}' is not paused",
                id
            )));
        }
        let updated = resume_schedule_model(self.storage.get_db(), current, Utc::now()).await?;
        info!("Report schedule {} resumed, next run {:?}", id, updated.next_run_at);
        Ok(updated.into())
    }

    /// 立即排队一次手动执行（暂停中的调度也允许）
    pub async fn run_now(&self, agency_id: &str, id: &str) -> Result<ExecutionView> {
        let schedule = Self::find_schedule(self.storage.get_db(), agency_id, id).await?;
        let now = Utc::now();
        let execution =
            enqueue_execution(self.storage.get_db(), &schedule, TriggerKind::Manual, now, now)
                .await?;
        info!("Manual execution {} queued for schedule {}", execution.id, id);
        Ok(execution.into())
    }

    pub async fn executions(
        &self,
        agency_id: &str,
        schedule_id: &str,
        page: PageRequest,
    ) -> Result<Paginated<ExecutionView>> {
        let (page, page_size) = page.resolve()?;
        let db = self.storage.get_db();
        Self::find_schedule(db, agency_id, schedule_id).await?;

        let query = report_execution::Entity::find()
            .filter(report_execution::Column::ScheduleId.eq(schedule_id))
            .order_by_desc(report_execution::Column::CreatedAt)
            .order_by_desc(report_execution::Column::Id);
        let total = query.clone().count(db).await?;
        let rows = query.paginate(db, page_size).fetch_page(page - 1).await?;

        Ok(Paginated::new(
            rows.into_iter().map(Into::into).collect(),
            page,
            page_size,
            total,
        ))
    }

    pub async fn get_execution(&self, agency_id: &str, id: &str) -> Result<ExecutionView> {
        Ok(Self::find_execution(self.storage.get_db(), agency_id, id)
            .await?
            .into())
    }

    /// 只能重试 failed 的执行；可选同时恢复被暂停的调度
    pub async fn retry_execution(
        &self,
        agency_id: &str,
        id: &str,
        resume_schedule: bool,
    ) -> Result<(ExecutionView, Option<ScheduleView>)> {
        let now = Utc::now();
        let txn = self.storage.get_db().begin().await?;

        let execution = Self::find_execution(&txn, agency_id, id).await?;
        let status: ExecutionStatus = parse_enum("status", &execution.status)?;
        if status != ExecutionStatus::Failed {
            return Err(SeoHubError::invalid_state(format!(
                "Execution '{}' is {}; only failed executions can be retried",
                id, status
            )));
        }
        let schedule_id = execution.schedule_id.clone();

        let mut model = execution.into_active_model();
        model.status = Set(ExecutionStatus::Queued.to_string());
        model.trigger_kind = Set(TriggerKind::Retry.to_string());
        model.attempts = Set(0);
        model.error = Set(None);
        model.next_attempt_at = Set(None);
        model.started_at = Set(None);
        model.finished_at = Set(None);
        let execution = model.update(&txn).await?;

        let mut resumed = None;
        if resume_schedule {
            let schedule = Self::find_schedule(&txn, agency_id, &schedule_id).await?;
            if schedule.status == ScheduleStatus::Paused.as_ref() {
                resumed = Some(resume_schedule_model(&txn, schedule, now).await?.into());
            }
        }

        txn.commit().await?;
        info!(
            "Execution {} re-queued for retry (schedule resumed: {})",
            id,
            resumed.is_some()
        );
        Ok((execution.into(), resumed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_recipients_dedupes() {
        let out = clean_recipients(vec![
            "Ops@Example.com".into(),
            "ops@example.com".into(),
            "seo@example.com".into(),
        ])
        .unwrap();
        assert_eq!(out, vec!["ops@example.com", "seo@example.com"]);
        assert!(clean_recipients(vec!["nope".into()]).is_err());
        let too_many = (0..=MAX_RECIPIENTS).map(|i| format!("u{}@example.com", i)).collect();
        assert!(clean_recipients(too_many).is_err());
    }

    #[test]
    fn test_max_failures_bounds() {
        assert!(check_max_failures(0).is_err());
        assert_eq!(check_max_failures(3).unwrap(), 3);
        assert!(check_max_failures(MAX_FAILURES_LIMIT + 1).is_err());
    }

    #[test]
    fn test_decode_recipients_tolerates_garbage() {
        assert!(decode_recipients("not json").is_empty());
        assert_eq!(decode_recipients(r#"["a@b.co"]"#), vec!["a@b.co"]);
    }
}
