//! Tenancy: agencies, users, invites and onboarding

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::get_config;
use crate::errors::{Result, SeoHubError};
use crate::storage::Storage;
use crate::storage::models::{Role, parse_enum};
use crate::utils::password::{hash_password, validate_new_password, verify_password};
use crate::utils::validation::{normalize_email, require_text, slugify, validate_http_url};
use crate::utils::{generate_random_suffix, generate_secure_token, new_id};
use migration::entities::{agency, invite, user};

use super::Actor;

const INVITE_TOKEN_BYTES: usize = 32;
const SLUG_SUFFIX_LEN: usize = 6;
const SLUG_ATTEMPTS: usize = 5;
pub const MAX_ONBOARDING_KEYWORDS: usize = 50;
pub const MAX_ONBOARDING_COMPETITORS: usize = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterAgencyInput {
    pub agency_name: String,
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgencyView {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub onboarded: bool,
    pub onboarded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<agency::Model> for AgencyView {
    fn from(m: agency::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            slug: m.slug,
            onboarded: m.onboarded_at.is_some(),
            onboarded_at: m.onboarded_at,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: String,
    pub agency_id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<user::Model> for UserView {
    fn from(m: user::Model) -> Self {
        Self {
            id: m.id,
            agency_id: m.agency_id,
            email: m.email,
            name: m.name,
            role: m.role,
            created_at: m.created_at,
            last_login_at: m.last_login_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InviteView {
    pub id: String,
    pub email: String,
    pub role: String,
    pub invited_by: String,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<invite::Model> for InviteView {
    fn from(m: invite::Model) -> Self {
        Self {
            id: m.id,
            email: m.email,
            role: m.role,
            invited_by: m.invited_by,
            expires_at: m.expires_at,
            accepted_at: m.accepted_at,
            created_at: m.created_at,
        }
    }
}

/// 新建邀请的结果；token 只在这里返回一次
#[derive(Debug, Clone, Serialize)]
pub struct CreatedInvite {
    #[serde(flatten)]
    pub invite: InviteView,
    pub token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OnboardingForm {
    pub business_name: String,
    pub website: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub competitors: Vec<String>,
    #[serde(default)]
    pub goals: Option<String>,
}

impl OnboardingForm {
    /// 校验并规范化（去除首尾空白）
    pub fn validated(self) -> Result<Self> {
        let business_name = require_text("business_name", &self.business_name, 200)?;
        let website = validate_http_url("website", &self.website)?;

        let keywords = clean_list("keywords", self.keywords, MAX_ONBOARDING_KEYWORDS)?;
        let competitors = clean_list("competitors", self.competitors, MAX_ONBOARDING_COMPETITORS)?;
        let locations = clean_list("locations", self.locations, MAX_ONBOARDING_KEYWORDS)?;

        Ok(Self {
            business_name,
            website,
            industry: trim_opt(self.industry),
            locations,
            keywords,
            competitors,
            goals: trim_opt(self.goals),
        })
    }
}

fn trim_opt(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn clean_list(field: &str, items: Vec<String>, max: usize) -> Result<Vec<String>> {
    if items.len() > max {
        return Err(SeoHubError::validation(format!(
            "{} accepts at most {} entries",
            field, max
        )));
    }
    items
        .into_iter()
        .map(|item| {
            let item = item.trim().to_string();
            if item.is_empty() {
                Err(SeoHubError::validation(format!(
                    "{} cannot contain empty entries",
                    field
                )))
            } else {
                Ok(item)
            }
        })
        .collect()
}

async fn count_owners<C: ConnectionTrait>(db: &C, agency_id: &str) -> Result<u64> {
    Ok(user::Entity::find()
        .filter(user::Column::AgencyId.eq(agency_id))
        .filter(user::Column::Role.eq(Role::Owner.as_ref()))
        .count(db)
        .await?)
}

async fn email_taken<C: ConnectionTrait>(db: &C, email: &str) -> Result<bool> {
    Ok(user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await?
        .is_some())
}

pub struct AgencyService {
    storage: Arc<Storage>,
}

impl AgencyService {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    // ============ Registration & authentication ============

    /// 自助注册（受 `auth.allow_registration` 控制）
    pub async fn register_agency(&self, input: RegisterAgencyInput) -> Result<(AgencyView, UserView)> {
        if !get_config().auth.allow_registration {
            return Err(SeoHubError::forbidden("Registration is disabled"));
        }
        self.create_agency(input).await
    }

    /// 在一个事务中创建 agency 和 owner
    pub async fn create_agency(&self, input: RegisterAgencyInput) -> Result<(AgencyView, UserView)> {
        let agency_name = require_text("agency_name", &input.agency_name, 120)?;
        let email = normalize_email(&input.email)?;
        let name = require_text("name", &input.name, 120)?;
        validate_new_password(&input.password)?;
        let password_hash = hash_password(&input.password)?;

        let txn = self.storage.get_db().begin().await?;

        if email_taken(&txn, &email).await? {
            return Err(SeoHubError::conflict(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let slug = self.unique_slug(&txn, &agency_name).await?;
        let now = Utc::now();
        let agency = agency::ActiveModel {
            id: Set(new_id()),
            name: Set(agency_name),
            slug: Set(slug),
            onboarding: Set(None),
            onboarded_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let owner = user::ActiveModel {
            id: Set(new_id()),
            agency_id: Set(agency.id.clone()),
            email: Set(email),
            name: Set(name),
            password_hash: Set(password_hash),
            role: Set(Role::Owner.to_string()),
            created_at: Set(now),
            last_login_at: Set(None),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!("Agency {} ({}) registered by {}", agency.id, agency.slug, owner.email);
        Ok((agency.into(), owner.into()))
    }

    async fn unique_slug<C: ConnectionTrait>(&self, db: &C, name: &str) -> Result<String> {
        let base = slugify(name);
        let mut candidate = base.clone();
        for _ in 0..SLUG_ATTEMPTS {
            let exists = agency::Entity::find()
                .filter(agency::Column::Slug.eq(candidate.as_str()))
                .one(db)
                .await?
                .is_some();
            if !exists {
                return Ok(candidate);
            }
            candidate = format!("{}-{}", base, generate_random_suffix(SLUG_SUFFIX_LEN));
        }
        Err(SeoHubError::conflict(format!(
            "Could not allocate a unique slug for '{}'",
            name
        )))
    }

    /// 邮箱不存在和密码错误返回同一个错误
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<UserView> {
        let invalid = || SeoHubError::unauthorized("Invalid email or password");
        let email = normalize_email(email).map_err(|_| invalid())?;

        let found = user::Entity::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .one(self.storage.get_db())
            .await?;
        let Some(found) = found else {
            warn!("Login failed for unknown email");
            return Err(invalid());
        };

        if !verify_password(password, &found.password_hash)? {
            warn!("Login failed for user {}", found.id);
            return Err(invalid());
        }

        let mut model = found.into_active_model();
        model.last_login_at = Set(Some(Utc::now()));
        let updated = model.update(self.storage.get_db()).await?;
        Ok(updated.into())
    }

    pub async fn get_user(&self, user_id: &str) -> Result<UserView> {
        user::Entity::find_by_id(user_id.to_string())
            .one(self.storage.get_db())
            .await?
            .map(Into::into)
            .ok_or_else(|| SeoHubError::not_found(format!("User '{}' not found", user_id)))
    }

    // ============ Agency ============

    async fn find_agency(&self, agency_id: &str) -> Result<agency::Model> {
        agency::Entity::find_by_id(agency_id.to_string())
            .one(self.storage.get_db())
            .await?
            .ok_or_else(|| SeoHubError::not_found(format!("Agency '{}' not found", agency_id)))
    }

    pub async fn get_agency(&self, agency_id: &str) -> Result<AgencyView> {
        Ok(self.find_agency(agency_id).await?.into())
    }

    pub async fn rename_agency(&self, actor: &Actor, name: &str) -> Result<AgencyView> {
        actor.require_role(Role::Admin)?;
        let name = require_text("name", name, 120)?;
        let mut model = self.find_agency(&actor.agency_id).await?.into_active_model();
        model.name = Set(name);
        model.updated_at = Set(Utc::now());
        Ok(model.update(self.storage.get_db()).await?.into())
    }

    // ============ Members ============

    pub async fn list_users(&self, agency_id: &str) -> Result<Vec<UserView>> {
        let rows = user::Entity::find()
            .filter(user::Column::AgencyId.eq(agency_id))
            .order_by_asc(user::Column::CreatedAt)
            .all(self.storage.get_db())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_member<C: ConnectionTrait>(
        db: &C,
        agency_id: &str,
        user_id: &str,
    ) -> Result<user::Model> {
        user::Entity::find_by_id(user_id.to_string())
            .filter(user::Column::AgencyId.eq(agency_id))
            .one(db)
            .await?
            .ok_or_else(|| SeoHubError::not_found(format!("User '{}' not found", user_id)))
    }

    /// 仅 owner 可改角色；最后一个 owner 不能降级
    pub async fn change_role(&self, actor: &Actor, user_id: &str, role: Role) -> Result<UserView> {
        actor.require_role(Role::Owner)?;

        let txn = self.storage.get_db().begin().await?;
        let target = Self::find_member(&txn, &actor.agency_id, user_id).await?;
        let current: Role = parse_enum("role", &target.role)?;

        if current == Role::Owner
            && role != Role::Owner
            && count_owners(&txn, &actor.agency_id).await? <= 1
        {
            return Err(SeoHubError::invalid_state(
                "The last owner of an agency cannot be demoted",
            ));
        }

        let mut model = target.into_active_model();
        model.role = Set(role.to_string());
        let updated = model.update(&txn).await?;
        txn.commit().await?;

        info!("User {} role changed {} -> {} by {}", user_id, current, role, actor.user_id);
        Ok(updated.into())
    }

    pub async fn remove_user(&self, actor: &Actor, user_id: &str) -> Result<()> {
        actor.require_role(Role::Admin)?;
        if actor.user_id == user_id {
            return Err(SeoHubError::invalid_state("You cannot remove yourself"));
        }

        let txn = self.storage.get_db().begin().await?;
        let target = Self::find_member(&txn, &actor.agency_id, user_id).await?;
        let target_role: Role = parse_enum("role", &target.role)?;

        if target_role == Role::Owner {
            if actor.role != Role::Owner {
                return Err(SeoHubError::forbidden("Only owners can remove owners"));
            }
            if count_owners(&txn, &actor.agency_id).await? <= 1 {
                return Err(SeoHubError::invalid_state(
                    "The last owner of an agency cannot be removed",
                ));
            }
        }

        user::Entity::delete_by_id(user_id.to_string())
            .exec(&txn)
            .await?;
        txn.commit().await?;

        info!("User {} removed from agency {} by {}", user_id, actor.agency_id, actor.user_id);
        Ok(())
    }

    // ============ Invites ============

    pub async fn create_invite(&self, actor: &Actor, email: &str, role: Role) -> Result<CreatedInvite> {
        actor.require_role(Role::Admin)?;
        if role == Role::Owner && actor.role != Role::Owner {
            return Err(SeoHubError::forbidden("Only owners can invite owners"));
        }
        let email = normalize_email(email)?;
        let db = self.storage.get_db();
        if email_taken(db, &email).await? {
            return Err(SeoHubError::conflict(format!(
                "Email '{}' already belongs to a user",
                email
            )));
        }

        let now = Utc::now();
        let ttl_hours = get_config().auth.invite_ttl_hours;
        let token = generate_secure_token(INVITE_TOKEN_BYTES);
        let created = invite::ActiveModel {
            id: Set(new_id()),
            agency_id: Set(actor.agency_id.clone()),
            email: Set(email),
            role: Set(role.to_string()),
            token: Set(token.clone()),
            invited_by: Set(actor.user_id.clone()),
            expires_at: Set(now + Duration::hours(ttl_hours as i64)),
            accepted_at: Set(None),
            created_at: Set(now),
        }
        .insert(db)
        .await?;

        info!("Invite {} created for {} as {}", created.id, created.email, created.role);
        Ok(CreatedInvite {
            invite: created.into(),
            token,
        })
    }

    pub async fn list_invites(&self, agency_id: &str) -> Result<Vec<InviteView>> {
        let rows = invite::Entity::find()
            .filter(invite::Column::AgencyId.eq(agency_id))
            .order_by_desc(invite::Column::CreatedAt)
            .all(self.storage.get_db())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn revoke_invite(&self, actor: &Actor, invite_id: &str) -> Result<()> {
        actor.require_role(Role::Admin)?;
        let found = invite::Entity::find_by_id(invite_id.to_string())
            .filter(invite::Column::AgencyId.eq(&actor.agency_id))
            .one(self.storage.get_db())
            .await?
            .ok_or_else(|| SeoHubError::not_found(format!("Invite '{}' not found", invite_id)))?;
        if found.accepted_at.is_some() {
            return Err(SeoHubError::invalid_state("Invite has already been accepted"));
        }
        invite::Entity::delete_by_id(found.id)
            .exec(self.storage.get_db())
            .await?;
        info!("Invite {} revoked by {}", invite_id, actor.user_id);
        Ok(())
    }

    /// 接受邀请：创建用户与标记邀请在同一事务内完成
    pub async fn accept_invite(&self, token: &str, name: &str, password: &str) -> Result<UserView> {
        let name = require_text("name", name, 120)?;
        validate_new_password(password)?;
        let password_hash = hash_password(password)?;

        let txn = self.storage.get_db().begin().await?;
        let found = invite::Entity::find()
            .filter(invite::Column::Token.eq(token))
            .one(&txn)
            .await?
            .ok_or_else(|| SeoHubError::not_found("Invite not found"))?;

        let now = Utc::now();
        if found.accepted_at.is_some() {
            return Err(SeoHubError::invalid_state("Invite has already been accepted"));
        }
        if found.expires_at <= now {
            return Err(SeoHubError::invalid_state("Invite has expired"));
        }
        if email_taken(&txn, &found.email).await? {
            return Err(SeoHubError::conflict(format!(
                "Email '{}' is already registered",
                found.email
            )));
        }

        let created = user::ActiveModel {
            id: Set(new_id()),
            agency_id: Set(found.agency_id.clone()),
            email: Set(found.email.clone()),
            name: Set(name),
            password_hash: Set(password_hash),
            role: Set(found.role.clone()),
            created_at: Set(now),
            last_login_at: Set(None),
        }
        .insert(&txn)
        .await?;

        let mut accepted = found.into_active_model();
        accepted.accepted_at = Set(Some(now));
        accepted.update(&txn).await?;

        txn.commit().await?;

        info!("Invite accepted: user {} joined agency {}", created.id, created.agency_id);
        Ok(created.into())
    }

    // ============ Onboarding ============

    /// 任何成员都可以提交，后提交的覆盖先前的内容
    pub async fn submit_onboarding(&self, actor: &Actor, form: OnboardingForm) -> Result<OnboardingForm> {
        let form = form.validated()?;
        let current = self.find_agency(&actor.agency_id).await?;
        let first_submission = current.onboarded_at.is_none();

        let now = Utc::now();
        let mut model = current.into_active_model();
        model.onboarding = Set(Some(serde_json::to_string(&form)?));
        if first_submission {
            model.onboarded_at = Set(Some(now));
        }
        model.updated_at = Set(now);
        model.update(self.storage.get_db()).await?;

        info!("Agency {} onboarding saved (first={})", actor.agency_id, first_submission);
        Ok(form)
    }

    pub async fn get_onboarding(&self, agency_id: &str) -> Result<Option<OnboardingForm>> {
        let agency = self.find_agency(agency_id).await?;
        match agency.onboarding {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> OnboardingForm {
        OnboardingForm {
            business_name: " Acme Plumbing ".into(),
            website: "https://acme.example".into(),
            keywords: vec![" plumber ".into(), "boiler repair".into()],
            competitors: vec!["Rival Plumbing".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_onboarding_normalizes() {
        let form = form().validated().unwrap();
        assert_eq!(form.business_name, "Acme Plumbing");
        assert_eq!(form.keywords, vec!["plumber", "boiler repair"]);
    }

    #[test]
    fn test_onboarding_limits() {
        let mut too_many = form();
        too_many.keywords = (0..=MAX_ONBOARDING_KEYWORDS).map(|i| format!("kw{}", i)).collect();
        assert!(too_many.validated().is_err());

        let mut empty_kw = form();
        empty_kw.keywords.push("  ".into());
        assert!(empty_kw.validated().is_err());

        let mut bad_site = form();
        bad_site.website = "acme.example".into();
        assert!(bad_site.validated().is_err());

        let mut no_name = form();
        no_name.business_name = "".into();
        assert!(no_name.validated().is_err());
    }

    #[test]
    fn test_require_role() {
        let member = Actor {
            user_id: "u".into(),
            agency_id: "a".into(),
            role: Role::Member,
        };
        assert!(member.require_role(Role::Admin).is_err());
        assert!(member.require_role(Role::Member).is_ok());
    }
}
