//! Service layer for business logic
//!
//! Shared between the HTTP handlers, the CLI and the report scheduler.
//! Every agency-scoped operation takes the agency id (or an [`Actor`])
//! explicitly.

pub mod agency_service;
pub mod ai;
pub mod chat_service;
pub mod escalation_service;
pub mod feature_flags;
pub mod report_service;
pub mod request_service;
pub mod stats_service;
pub mod webhook_service;

use std::sync::Arc;

pub use agency_service::AgencyService;
pub use chat_service::ChatService;
pub use escalation_service::EscalationService;
pub use feature_flags::{FeatureFlagService, FlagKey, FlagScope};
pub use report_service::ReportService;
pub use request_service::RequestService;
pub use stats_service::StatsService;
pub use webhook_service::WebhookService;

use crate::config::StaticConfig;
use crate::errors::{Result, SeoHubError};
use crate::scheduler::GeneratorRegistry;
use crate::storage::Storage;
use crate::storage::models::Role;
use ai::ChatProvider;

/// 已认证的调用者
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub agency_id: String,
    pub role: Role,
}

impl Actor {
    /// 角色不足时返回 Forbidden
    pub fn require_role(&self, min: Role) -> Result<()> {
        if self.role.at_least(min) {
            Ok(())
        } else {
            Err(SeoHubError::forbidden(format!("Requires {} role", min)))
        }
    }
}

/// 所有服务的集合，HTTP 层通过 `web::Data<AppServices>` 共享
#[derive(Clone)]
pub struct AppServices {
    pub storage: Arc<Storage>,
    pub generators: Arc<GeneratorRegistry>,
    pub agencies: Arc<AgencyService>,
    pub requests: Arc<RequestService>,
    pub reports: Arc<ReportService>,
    pub escalations: Arc<EscalationService>,
    pub webhooks: Arc<WebhookService>,
    pub chat: Arc<ChatService>,
    pub flags: Arc<FeatureFlagService>,
    pub stats: Arc<StatsService>,
}

impl AppServices {
    /// 使用内置生成器与配置中的 chat provider
    pub fn new(storage: Arc<Storage>, config: &StaticConfig) -> Self {
        let generators = Arc::new(GeneratorRegistry::with_defaults(storage.clone()));
        let provider = chat_service::provider_from_config(&config.ai);
        Self::with_parts(storage, config, generators, provider)
    }

    /// 测试中注入自定义生成器或 provider
    pub fn with_parts(
        storage: Arc<Storage>,
        config: &StaticConfig,
        generators: Arc<GeneratorRegistry>,
        provider: Option<Arc<dyn ChatProvider>>,
    ) -> Self {
        Self {
            agencies: Arc::new(AgencyService::new(storage.clone())),
            requests: Arc::new(RequestService::new(storage.clone())),
            reports: Arc::new(ReportService::new(storage.clone(), generators.clone())),
            escalations: Arc::new(EscalationService::new(storage.clone())),
            webhooks: Arc::new(WebhookService::new(storage.clone(), &config.webhook.source)),
            chat: Arc::new(ChatService::new(storage.clone(), provider)),
            flags: Arc::new(FeatureFlagService::new(storage.clone())),
            stats: Arc::new(StatsService::new(storage.clone())),
            generators,
            storage,
        }
    }
}
