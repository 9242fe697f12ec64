//! Tenancy tests
//!
//! Agencies, members, invites and onboarding against a temporary SQLite database.

use std::sync::{Arc, Once};

use seohub::config::init_config;
use seohub::errors::SeoHubError;
use seohub::services::agency_service::{OnboardingForm, RegisterAgencyInput, UserView};
use seohub::services::{Actor, AgencyService};
use seohub::storage::Storage;
use seohub::storage::models::{Role, parse_enum};
use tempfile::TempDir;

static INIT: Once = Once::new();

fn init_test_config() {
    INIT.call_once(|| {
        init_config();
    });
}

async fn create_temp_storage() -> (Arc<Storage>, TempDir) {
    init_test_config();

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("agency_test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let storage = Storage::connect_url(&db_url)
        .await
        .expect("Failed to create storage");

    (Arc::new(storage), temp_dir)
}

fn registration(agency: &str, email: &str) -> RegisterAgencyInput {
    RegisterAgencyInput {
        agency_name: agency.to_string(),
        email: email.to_string(),
        name: "Owner".to_string(),
        password: "correct-horse".to_string(),
    }
}

fn actor_for(user: &UserView) -> Actor {
    Actor {
        user_id: user.id.clone(),
        agency_id: user.agency_id.clone(),
        role: parse_enum::<Role>("role", &user.role).unwrap(),
    }
}

// =============================================================================
// Registration & authentication
// =============================================================================

#[tokio::test]
async fn test_create_agency_makes_owner() {
    let (storage, _dir) = create_temp_storage().await;
    let service = AgencyService::new(storage);

    let (agency, owner) = service
        .create_agency(registration("Acme SEO", "Owner@Acme.test"))
        .await
        .unwrap();

    assert_eq!(agency.name, "Acme SEO");
    assert_eq!(agency.slug, "acme-seo");
    assert!(!agency.onboarded);
    assert_eq!(owner.role, "owner");
    assert_eq!(owner.email, "owner@acme.test");
    assert_eq!(owner.agency_id, agency.id);
}

#[tokio::test]
async fn test_duplicate_email_conflicts() {
    let (storage, _dir) = create_temp_storage().await;
    let service = AgencyService::new(storage);

    service
        .create_agency(registration("First", "dup@example.com"))
        .await
        .unwrap();
    let err = service
        .create_agency(registration("Second", "DUP@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, SeoHubError::Conflict(_)));
}

#[tokio::test]
async fn test_same_name_gets_distinct_slug() {
    let (storage, _dir) = create_temp_storage().await;
    let service = AgencyService::new(storage);

    let (a, _) = service
        .create_agency(registration("Rank Up", "a@example.com"))
        .await
        .unwrap();
    let (b, _) = service
        .create_agency(registration("Rank Up", "b@example.com"))
        .await
        .unwrap();
    assert_eq!(a.slug, "rank-up");
    assert_ne!(a.slug, b.slug);
    assert!(b.slug.starts_with("rank-up-"));
}

#[tokio::test]
async fn test_authenticate() {
    let (storage, _dir) = create_temp_storage().await;
    let service = AgencyService::new(storage);
    service
        .create_agency(registration("Acme", "login@example.com"))
        .await
        .unwrap();

    let user = service
        .authenticate("login@example.com", "correct-horse")
        .await
        .unwrap();
    assert_eq!(user.email, "login@example.com");
    assert!(user.last_login_at.is_some());

    let wrong = service
        .authenticate("login@example.com", "wrong-password")
        .await
        .unwrap_err();
    let unknown = service
        .authenticate("nobody@example.com", "correct-horse")
        .await
        .unwrap_err();
    // 同一个错误信息，不泄露邮箱是否存在
    assert_eq!(wrong.to_string(), unknown.to_string());
    assert!(matches!(wrong, SeoHubError::Unauthorized(_)));
}

#[tokio::test]
async fn test_short_password_rejected() {
    let (storage, _dir) = create_temp_storage().await;
    let service = AgencyService::new(storage);
    let mut input = registration("Acme", "short@example.com");
    input.password = "short".to_string();
    let err = service.create_agency(input).await.unwrap_err();
    assert!(matches!(err, SeoHubError::Validation(_)));
}

// =============================================================================
// Invites & members
// =============================================================================

#[tokio::test]
async fn test_invite_accept_flow() {
    let (storage, _dir) = create_temp_storage().await;
    let service = AgencyService::new(storage);
    let (agency, owner) = service
        .create_agency(registration("Acme", "owner@example.com"))
        .await
        .unwrap();
    let owner = actor_for(&owner);

    let created = service
        .create_invite(&owner, "writer@example.com", Role::Member)
        .await
        .unwrap();
    assert_eq!(created.invite.role, "member");
    assert!(!created.token.is_empty());

    let member = service
        .accept_invite(&created.token, "Writer", "writer-pass")
        .await
        .unwrap();
    assert_eq!(member.agency_id, agency.id);
    assert_eq!(member.role, "member");

    // 已接受的邀请不能再用
    let again = service
        .accept_invite(&created.token, "Writer", "writer-pass")
        .await
        .unwrap_err();
    assert!(matches!(again, SeoHubError::InvalidState(_)));

    let users = service.list_users(&agency.id).await.unwrap();
    assert_eq!(users.len(), 2);

    let invites = service.list_invites(&agency.id).await.unwrap();
    assert_eq!(invites.len(), 1);
    assert!(invites[0].accepted_at.is_some());
}

#[tokio::test]
async fn test_member_cannot_invite() {
    let (storage, _dir) = create_temp_storage().await;
    let service = AgencyService::new(storage);
    let (_, owner) = service
        .create_agency(registration("Acme", "boss@example.com"))
        .await
        .unwrap();
    let owner = actor_for(&owner);

    let invite = service
        .create_invite(&owner, "m@example.com", Role::Member)
        .await
        .unwrap();
    let member = service
        .accept_invite(&invite.token, "Member", "member-pass")
        .await
        .unwrap();
    let member = actor_for(&member);

    let err = service
        .create_invite(&member, "other@example.com", Role::Member)
        .await
        .unwrap_err();
    assert!(matches!(err, SeoHubError::Forbidden(_)));

    let err = service.rename_agency(&member, "Hijacked").await.unwrap_err();
    assert!(matches!(err, SeoHubError::Forbidden(_)));
}

#[tokio::test]
async fn test_invite_for_existing_email_conflicts() {
    let (storage, _dir) = create_temp_storage().await;
    let service = AgencyService::new(storage);
    let (_, owner) = service
        .create_agency(registration("Acme", "taken@example.com"))
        .await
        .unwrap();
    let err = service
        .create_invite(&actor_for(&owner), "taken@example.com", Role::Member)
        .await
        .unwrap_err();
    assert!(matches!(err, SeoHubError::Conflict(_)));
}

#[tokio::test]
async fn test_revoke_invite() {
    let (storage, _dir) = create_temp_storage().await;
    let service = AgencyService::new(storage);
    let (agency, owner) = service
        .create_agency(registration("Acme", "rev@example.com"))
        .await
        .unwrap();
    let owner = actor_for(&owner);

    let invite = service
        .create_invite(&owner, "gone@example.com", Role::Admin)
        .await
        .unwrap();
    service.revoke_invite(&owner, &invite.invite.id).await.unwrap();
    assert!(service.list_invites(&agency.id).await.unwrap().is_empty());

    let err = service
        .accept_invite(&invite.token, "Gone", "gone-pass-1")
        .await
        .unwrap_err();
    assert!(matches!(err, SeoHubError::NotFound(_)));
}

#[tokio::test]
async fn test_last_owner_protected() {
    let (storage, _dir) = create_temp_storage().await;
    let service = AgencyService::new(storage);
    let (_, owner_view) = service
        .create_agency(registration("Acme", "solo@example.com"))
        .await
        .unwrap();
    let owner = actor_for(&owner_view);

    let err = service
        .change_role(&owner, &owner_view.id, Role::Admin)
        .await
        .unwrap_err();
    assert!(matches!(err, SeoHubError::InvalidState(_)));

    let err = service.remove_user(&owner, &owner_view.id).await.unwrap_err();
    assert!(matches!(err, SeoHubError::InvalidState(_)));
}

#[tokio::test]
async fn test_change_role_and_remove() {
    let (storage, _dir) = create_temp_storage().await;
    let service = AgencyService::new(storage);
    let (agency, owner) = service
        .create_agency(registration("Acme", "own@example.com"))
        .await
        .unwrap();
    let owner = actor_for(&owner);

    let invite = service
        .create_invite(&owner, "promo@example.com", Role::Member)
        .await
        .unwrap();
    let member = service
        .accept_invite(&invite.token, "Promo", "promo-pass")
        .await
        .unwrap();

    let promoted = service
        .change_role(&owner, &member.id, Role::Admin)
        .await
        .unwrap();
    assert_eq!(promoted.role, "admin");

    // admin 不能修改角色
    let admin = actor_for(&promoted);
    let err = service
        .change_role(&admin, &member.id, Role::Owner)
        .await
        .unwrap_err();
    assert!(matches!(err, SeoHubError::Forbidden(_)));

    service.remove_user(&owner, &member.id).await.unwrap();
    assert_eq!(service.list_users(&agency.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_members_are_tenant_scoped() {
    let (storage, _dir) = create_temp_storage().await;
    let service = AgencyService::new(storage);
    let (_, owner_a) = service
        .create_agency(registration("Alpha", "a@alpha.test"))
        .await
        .unwrap();
    let (_, owner_b) = service
        .create_agency(registration("Beta", "b@beta.test"))
        .await
        .unwrap();

    let err = service
        .remove_user(&actor_for(&owner_a), &owner_b.id)
        .await
        .unwrap_err();
    assert!(matches!(err, SeoHubError::NotFound(_)));
}

// =============================================================================
// Onboarding
// =============================================================================

#[tokio::test]
async fn test_onboarding_submission() {
    let (storage, _dir) = create_temp_storage().await;
    let service = AgencyService::new(storage);
    let (agency, owner) = service
        .create_agency(registration("Acme", "onb@example.com"))
        .await
        .unwrap();
    let owner = actor_for(&owner);

    assert!(service.get_onboarding(&agency.id).await.unwrap().is_none());

    let form = OnboardingForm {
        business_name: "  Acme Plumbing ".to_string(),
        website: "https://acme-plumbing.test".to_string(),
        keywords: vec!["plumber".to_string(), "emergency plumber".to_string()],
        ..Default::default()
    };
    let saved = service.submit_onboarding(&owner, form).await.unwrap();
    assert_eq!(saved.business_name, "Acme Plumbing");

    let loaded = service.get_onboarding(&agency.id).await.unwrap().unwrap();
    assert_eq!(loaded, saved);
    assert!(service.get_agency(&agency.id).await.unwrap().onboarded);

    let bad = OnboardingForm {
        business_name: "Acme".to_string(),
        website: "ftp://nope".to_string(),
        ..Default::default()
    };
    assert!(service.submit_onboarding(&owner, bad).await.is_err());

    // 普通成员也可以更新 onboarding
    let invite = service
        .create_invite(&owner, "helper@example.com", Role::Member)
        .await
        .unwrap();
    let member = service
        .accept_invite(&invite.token, "Helper", "helper-pass")
        .await
        .unwrap();
    let member = actor_for(&member);
    assert_eq!(member.role, Role::Member);

    let update = OnboardingForm {
        business_name: "Acme Plumbing & Heating".to_string(),
        website: "https://acme-plumbing.test".to_string(),
        ..Default::default()
    };
    service.submit_onboarding(&member, update).await.unwrap();
    let loaded = service.get_onboarding(&agency.id).await.unwrap().unwrap();
    assert_eq!(loaded.business_name, "Acme Plumbing & Heating");
}
