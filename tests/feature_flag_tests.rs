//! Feature flag resolution tests
//!
//! agency override > global override > config `[features]` > built-in default

use std::sync::{Arc, Once};

use seohub::config::init_config;
use seohub::errors::SeoHubError;
use seohub::services::feature_flags::FlagSource;
use seohub::services::{FeatureFlagService, FlagKey, FlagScope};
use seohub::storage::Storage;
use tempfile::TempDir;

static INIT: Once = Once::new();

fn init_test_config() {
    INIT.call_once(|| {
        init_config();
    });
}

async fn create_service() -> (FeatureFlagService, TempDir) {
    init_test_config();

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("flags_test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let storage = Storage::connect_url(&db_url)
        .await
        .expect("Failed to create storage");

    (FeatureFlagService::new(Arc::new(storage)), temp_dir)
}

#[tokio::test]
async fn test_defaults_when_nothing_set() {
    let (flags, _dir) = create_service().await;

    let resolved = flags.resolve(Some("agency-1"), FlagKey::AiChat).await.unwrap();
    assert!(resolved.enabled);
    assert_eq!(resolved.source, FlagSource::Default);

    let all = flags.list_resolved(None).await.unwrap();
    assert_eq!(all.len(), 5);
    assert!(all.iter().all(|f| f.source == FlagSource::Default));
}

#[tokio::test]
async fn test_agency_overrides_global() {
    let (flags, _dir) = create_service().await;

    flags
        .set(&FlagScope::Global, FlagKey::ReportScheduling, false)
        .await
        .unwrap();
    let global = flags
        .resolve(Some("agency-1"), FlagKey::ReportScheduling)
        .await
        .unwrap();
    assert!(!global.enabled);
    assert_eq!(global.source, FlagSource::Global);

    flags
        .set(
            &FlagScope::Agency("agency-1".to_string()),
            FlagKey::ReportScheduling,
            true,
        )
        .await
        .unwrap();
    let agency = flags
        .resolve(Some("agency-1"), FlagKey::ReportScheduling)
        .await
        .unwrap();
    assert!(agency.enabled);
    assert_eq!(agency.source, FlagSource::Agency);

    // 其他机构仍然只看全局
    assert!(
        !flags
            .is_enabled(Some("agency-2"), FlagKey::ReportScheduling)
            .await
            .unwrap()
    );
    assert!(
        !flags
            .is_enabled(None, FlagKey::ReportScheduling)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_set_twice_upserts() {
    let (flags, _dir) = create_service().await;
    let scope = FlagScope::Agency("agency-1".to_string());

    flags.set(&scope, FlagKey::Escalations, false).await.unwrap();
    flags.set(&scope, FlagKey::Escalations, true).await.unwrap();
    flags.set(&scope, FlagKey::Escalations, false).await.unwrap();

    let resolved = flags
        .resolve(Some("agency-1"), FlagKey::Escalations)
        .await
        .unwrap();
    assert!(!resolved.enabled);
}

#[tokio::test]
async fn test_unset_falls_back() {
    let (flags, _dir) = create_service().await;
    let scope = FlagScope::Agency("agency-1".to_string());

    flags.set(&scope, FlagKey::AiChat, false).await.unwrap();
    assert!(!flags.is_enabled(Some("agency-1"), FlagKey::AiChat).await.unwrap());

    assert!(flags.unset(&scope, FlagKey::AiChat).await.unwrap());
    let resolved = flags.resolve(Some("agency-1"), FlagKey::AiChat).await.unwrap();
    assert!(resolved.enabled);
    assert_eq!(resolved.source, FlagSource::Default);

    // 没有覆盖值时返回 false
    assert!(!flags.unset(&scope, FlagKey::AiChat).await.unwrap());
}

#[tokio::test]
async fn test_require_reports_feature_disabled() {
    let (flags, _dir) = create_service().await;
    flags
        .set(&FlagScope::Agency("agency-1".to_string()), FlagKey::OnboardingWizard, false)
        .await
        .unwrap();

    let err = flags
        .require("agency-1", FlagKey::OnboardingWizard)
        .await
        .unwrap_err();
    assert!(matches!(err, SeoHubError::FeatureDisabled(_)));
    assert!(flags.require("agency-2", FlagKey::OnboardingWizard).await.is_ok());
}
