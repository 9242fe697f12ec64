//! Report generators
//!
//! 每种 `report_type` 对应一个 [`ReportGenerator`]；内置生成器只读本地数据库。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use serde_json::{Value, json};
use strum::IntoEnumIterator;

use crate::errors::Result;
use crate::storage::Storage;
use crate::storage::models::{EscalationSeverity, EscalationStatus, RequestStatus};
use migration::entities::{escalation, seo_request};

pub const REQUEST_SUMMARY: &str = "request_summary";
pub const ESCALATION_DIGEST: &str = "escalation_digest";

/// 报表内列表的最大条数
const REPORT_LIST_LIMIT: u64 = 20;
/// 首次运行时的默认统计窗口
const DEFAULT_WINDOW_DAYS: i64 = 7;

/// 生成一次报表所需的上下文
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub agency_id: String,
    pub schedule_id: String,
    pub schedule_name: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

impl ReportContext {
    /// 窗口为 `[last_run_at 或 now-7d, now)`
    pub fn new(
        agency_id: &str,
        schedule_id: &str,
        schedule_name: &str,
        last_run_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            agency_id: agency_id.to_string(),
            schedule_id: schedule_id.to_string(),
            schedule_name: schedule_name.to_string(),
            window_start: last_run_at.unwrap_or(now - Duration::days(DEFAULT_WINDOW_DAYS)),
            window_end: now,
        }
    }
}

#[async_trait]
pub trait ReportGenerator: Send + Sync {
    fn report_type(&self) -> &'static str;

    async fn generate(&self, ctx: &ReportContext) -> Result<Value>;
}

/// report_type → generator
#[derive(Clone, Default)]
pub struct GeneratorRegistry {
    generators: HashMap<String, Arc<dyn ReportGenerator>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册内置生成器
    pub fn with_defaults(storage: Arc<Storage>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(RequestSummaryGenerator::new(storage.clone())));
        registry.register(Arc::new(EscalationDigestGenerator::new(storage)));
        registry
    }

    pub fn register(&mut self, generator: Arc<dyn ReportGenerator>) {
        self.generators
            .insert(generator.report_type().to_string(), generator);
    }

    pub fn get(&self, report_type: &str) -> Option<Arc<dyn ReportGenerator>> {
        self.generators.get(report_type).cloned()
    }

    pub fn contains(&self, report_type: &str) -> bool {
        self.generators.contains_key(report_type)
    }

    pub fn report_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.generators.keys().cloned().collect();
        types.sort();
        types
    }
}

pub struct RequestSummaryGenerator {
    storage: Arc<Storage>,
}

impl RequestSummaryGenerator {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl ReportGenerator for RequestSummaryGenerator {
    fn report_type(&self) -> &'static str {
        REQUEST_SUMMARY
    }

    async fn generate(&self, ctx: &ReportContext) -> Result<Value> {
        let db = self.storage.get_db();

        let mut by_status = BTreeMap::new();
        for status in RequestStatus::iter() {
            let count = seo_request::Entity::find()
                .filter(seo_request::Column::AgencyId.eq(&ctx.agency_id))
                .filter(seo_request::Column::Status.eq(status.as_ref()))
                .count(db)
                .await?;
            by_status.insert(status.to_string(), count);
        }

        let created = seo_request::Entity::find()
            .filter(seo_request::Column::AgencyId.eq(&ctx.agency_id))
            .filter(seo_request::Column::CreatedAt.gte(ctx.window_start))
            .filter(seo_request::Column::CreatedAt.lt(ctx.window_end))
            .count(db)
            .await?;

        let completed_query = seo_request::Entity::find()
            .filter(seo_request::Column::AgencyId.eq(&ctx.agency_id))
            .filter(seo_request::Column::CompletedAt.gte(ctx.window_start))
            .filter(seo_request::Column::CompletedAt.lt(ctx.window_end));
        let completed = completed_query.clone().count(db).await?;
        let recent: Vec<Value> = completed_query
            .order_by_desc(seo_request::Column::CompletedAt)
            .limit(REPORT_LIST_LIMIT)
            .all(db)
            .await?
            .into_iter()
            .map(|r| {
                json!({
                    "id": r.id,
                    "title": r.title,
                    "service_type": r.service_type,
                    "deliverable_url": r.deliverable_url,
                    "completed_at": r.completed_at,
                })
            })
            .collect();

        Ok(json!({
            "report_type": REQUEST_SUMMARY,
            "schedule": ctx.schedule_name,
            "window": { "start": ctx.window_start, "end": ctx.window_end },
            "by_status": by_status,
            "created_in_window": created,
            "completed_in_window": completed,
            "recently_completed": recent,
        }))
    }
}

pub struct EscalationDigestGenerator {
    storage: Arc<Storage>,
}

impl EscalationDigestGenerator {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl ReportGenerator for EscalationDigestGenerator {
    fn report_type(&self) -> &'static str {
        ESCALATION_DIGEST
    }

    async fn generate(&self, ctx: &ReportContext) -> Result<Value> {
        let db = self.storage.get_db();
        let unresolved = [
            EscalationStatus::Open.to_string(),
            EscalationStatus::Acknowledged.to_string(),
        ];

        let mut by_severity = BTreeMap::new();
        for severity in EscalationSeverity::iter() {
            let count = escalation::Entity::find()
                .filter(escalation::Column::AgencyId.eq(&ctx.agency_id))
                .filter(escalation::Column::Status.is_in(unresolved.clone()))
                .filter(escalation::Column::Severity.eq(severity.as_ref()))
                .count(db)
                .await?;
            by_severity.insert(severity.to_string(), count);
        }

        let recent: Vec<Value> = escalation::Entity::find()
            .filter(escalation::Column::AgencyId.eq(&ctx.agency_id))
            .filter(escalation::Column::Status.is_in(unresolved.clone()))
            .order_by_desc(escalation::Column::CreatedAt)
            .limit(REPORT_LIST_LIMIT)
            .all(db)
            .await?
            .into_iter()
            .map(|e| {
                json!({
                    "id": e.id,
                    "subject": e.subject,
                    "severity": e.severity,
                    "status": e.status,
                    "request_id": e.request_id,
                    "schedule_id": e.schedule_id,
                    "created_at": e.created_at,
                })
            })
            .collect();

        let total: u64 = by_severity.values().sum();
        Ok(json!({
            "report_type": ESCALATION_DIGEST,
            "schedule": ctx.schedule_name,
            "generated_at": ctx.window_end,
            "unresolved_total": total,
            "by_severity": by_severity,
            "recent": recent,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    #[async_trait]
    impl ReportGenerator for Fixed {
        fn report_type(&self) -> &'static str {
            "fixed"
        }

        async fn generate(&self, _ctx: &ReportContext) -> Result<Value> {
            Ok(json!({"ok": true}))
        }
    }

    #[test]
    fn test_context_window() {
        let now = Utc::now();
        let ctx = ReportContext::new("a", "s", "weekly", None, now);
        assert_eq!(ctx.window_start, now - Duration::days(7));
        let last = now - Duration::hours(3);
        let ctx = ReportContext::new("a", "s", "weekly", Some(last), now);
        assert_eq!(ctx.window_start, last);
    }

    #[test]
    fn test_registry() {
        let mut registry = GeneratorRegistry::new();
        assert!(!registry.contains("fixed"));
        registry.register(Arc::new(Fixed));
        assert!(registry.contains("fixed"));
        assert_eq!(registry.report_types(), vec!["fixed".to_string()]);
        assert!(registry.get("missing").is_none());
    }
}
