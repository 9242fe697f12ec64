//! Feature flag resolution
//!
//! 解析顺序：agency 覆盖 → 全局覆盖（数据库）→ 静态配置 `[features]` → 内置默认值。
//! 解析结果缓存在 moka 中（30 秒 TTL），任何写操作都会清空缓存。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::Serialize;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::{debug, info};

use crate::config::get_config;
use crate::errors::{Result, SeoHubError};
use crate::storage::Storage;
use crate::storage::models::parse_enum;
use migration::entities::feature_flag;

/// 全局作用域在 `feature_flags.scope` 中的取值
pub const GLOBAL_SCOPE: &str = "global";

const FLAG_CACHE_TTL_SECS: u64 = 30;
const FLAG_CACHE_MAX_CAPACITY: u64 = 10_000;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, EnumIter, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FlagKey {
    AiChat,
    ReportScheduling,
    WebhookIngest,
    OnboardingWizard,
    Escalations,
}

impl FlagKey {
    pub fn default_enabled(self) -> bool {
        match self {
            FlagKey::AiChat
            | FlagKey::ReportScheduling
            | FlagKey::WebhookIngest
            | FlagKey::OnboardingWizard
            | FlagKey::Escalations => true,
        }
    }

    pub fn parse(key: &str) -> Result<Self> {
        parse_enum("feature flag", key)
    }
}

/// 生效值来自哪一层
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagSource {
    Agency,
    Global,
    Config,
    Default,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedFlag {
    pub key: FlagKey,
    pub enabled: bool,
    pub source: FlagSource,
}

/// 写入目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagScope {
    Global,
    Agency(String),
}

impl FlagScope {
    fn as_db_value(&self) -> &str {
        match self {
            FlagScope::Global => GLOBAL_SCOPE,
            FlagScope::Agency(id) => id,
        }
    }
}

pub struct FeatureFlagService {
    storage: Arc<Storage>,
    /// (agency_id or "", key) → resolution
    cache: Cache<(String, FlagKey), ResolvedFlag>,
}

impl FeatureFlagService {
    pub fn new(storage: Arc<Storage>) -> Self {
        let cache = Cache::builder()
            .max_capacity(FLAG_CACHE_MAX_CAPACITY)
            .time_to_live(Duration::from_secs(FLAG_CACHE_TTL_SECS))
            .build();
        Self { storage, cache }
    }

    /// 解析单个 flag；`agency_id` 为 None 时只看全局层
    pub async fn resolve(&self, agency_id: Option<&str>, key: FlagKey) -> Result<ResolvedFlag> {
        let cache_key = (agency_id.unwrap_or_default().to_string(), key);
        if let Some(hit) = self.cache.get(&cache_key).await {
            return Ok(hit);
        }

        let mut scopes = vec![GLOBAL_SCOPE.to_string()];
        if let Some(id) = agency_id {
            scopes.push(id.to_string());
        }

        let rows = feature_flag::Entity::find()
            .filter(feature_flag::Column::FlagKey.eq(key.as_ref()))
            .filter(feature_flag::Column::Scope.is_in(scopes))
            .all(self.storage.get_db())
            .await?;

        let agency_row = agency_id.and_then(|id| rows.iter().find(|r| r.scope == id));
        let global_row = rows.iter().find(|r| r.scope == GLOBAL_SCOPE);

        let resolved = if let Some(row) = agency_row {
            ResolvedFlag {
                key,
                enabled: row.enabled,
                source: FlagSource::Agency,
            }
        } else if let Some(row) = global_row {
            ResolvedFlag {
                key,
                enabled: row.enabled,
                source: FlagSource::Global,
            }
        } else if let Some(enabled) = get_config().features.get(key.as_ref()) {
            ResolvedFlag {
                key,
                enabled: *enabled,
                source: FlagSource::Config,
            }
        } else {
            ResolvedFlag {
                key,
                enabled: key.default_enabled(),
                source: FlagSource::Default,
            }
        };

        self.cache.insert(cache_key, resolved.clone()).await;
        Ok(resolved)
    }

    pub async fn is_enabled(&self, agency_id: Option<&str>, key: FlagKey) -> Result<bool> {
        Ok(self.resolve(agency_id, key).await?.enabled)
    }

    /// 关闭时返回 `FeatureDisabled`
    pub async fn require(&self, agency_id: &str, key: FlagKey) -> Result<()> {
        if self.is_enabled(Some(agency_id), key).await? {
            Ok(())
        } else {
            Err(SeoHubError::feature_disabled(format!(
                "Feature '{}' is disabled",
                key
            )))
        }
    }

    pub async fn list_resolved(&self, agency_id: Option<&str>) -> Result<Vec<ResolvedFlag>> {
        let mut out = Vec::new();
        for key in FlagKey::iter() {
            out.push(self.resolve(agency_id, key).await?);
        }
        Ok(out)
    }

    pub async fn set(&self, scope: &FlagScope, key: FlagKey, enabled: bool) -> Result<()> {
        let model = feature_flag::ActiveModel {
            scope: Set(scope.as_db_value().to_string()),
            flag_key: Set(key.as_ref().to_string()),
            enabled: Set(enabled),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };

        feature_flag::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([feature_flag::Column::Scope, feature_flag::Column::FlagKey])
                    .update_columns([feature_flag::Column::Enabled, feature_flag::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec(self.storage.get_db())
            .await?;

        self.cache.invalidate_all();
        info!(
            "Feature flag '{}' set to {} for scope {}",
            key,
            enabled,
            scope.as_db_value()
        );
        Ok(())
    }

    /// 删除覆盖值；返回是否真的删除了一行
    pub async fn unset(&self, scope: &FlagScope, key: FlagKey) -> Result<bool> {
        let res = feature_flag::Entity::delete_many()
            .filter(feature_flag::Column::Scope.eq(scope.as_db_value()))
            .filter(feature_flag::Column::FlagKey.eq(key.as_ref()))
            .exec(self.storage.get_db())
            .await?;

        self.cache.invalidate_all();
        debug!(
            "Feature flag '{}' unset for scope {} ({} rows)",
            key,
            scope.as_db_value(),
            res.rows_affected
        );
        Ok(res.rows_affected > 0)
    }
}
