//! API v1 请求/响应类型

use serde::{Deserialize, Serialize};

use crate::api::jwt::TokenPair;
use crate::services::agency_service::{AgencyView, UserView};
use crate::services::report_service::{ExecutionView, ScheduleView};
use crate::storage::Paginated;
use crate::storage::models::{RequestStatus, Role};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PaginatedResponse<T> {
    pub code: i32,
    pub message: String,
    pub data: Vec<T>,
    pub pagination: PaginationInfo,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaginationInfo {
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> From<&Paginated<T>> for PaginationInfo {
    fn from(p: &Paginated<T>) -> Self {
        Self {
            page: p.page,
            page_size: p.page_size,
            total: p.total,
            total_pages: p.total_pages,
        }
    }
}

#[derive(Serialize, Clone, Debug)]
pub struct DeletedResponse {
    pub id: String,
    pub deleted: bool,
}

impl DeletedResponse {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            deleted: true,
        }
    }
}

// ---- auth ----

#[derive(Deserialize, Clone, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize, Clone, Debug)]
pub struct AuthResponse {
    pub user: UserView,
    pub agency: AgencyView,
    pub tokens: TokenPair,
}

#[derive(Serialize, Clone, Debug)]
pub struct MeResponse {
    pub user: UserView,
    pub agency: AgencyView,
}

// ---- agency ----

#[derive(Deserialize, Clone, Debug)]
pub struct RenameAgencyRequest {
    pub name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

fn default_invite_role() -> Role {
    Role::Member
}

#[derive(Deserialize, Clone, Debug)]
pub struct CreateInviteRequest {
    pub email: String,
    #[serde(default = "default_invite_role")]
    pub role: Role,
}

#[derive(Deserialize, Clone, Debug)]
pub struct AcceptInviteRequest {
    pub name: String,
    pub password: String,
}

// ---- requests ----

#[derive(Deserialize, Clone, Debug)]
pub struct TransitionRequest {
    pub status: RequestStatus,
    #[serde(default)]
    pub note: Option<String>,
}

// ---- reports ----

#[derive(Deserialize, Clone, Debug, Default)]
pub struct PauseRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct RetryExecutionRequest {
    #[serde(default)]
    pub resume_schedule: bool,
}

#[derive(Serialize, Clone, Debug)]
pub struct RetryExecutionResponse {
    pub execution: ExecutionView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleView>,
}

// ---- chat ----

#[derive(Deserialize, Clone, Debug, Default)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RenameConversationRequest {
    pub title: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default)]
    pub model: Option<String>,
}

// ---- feature flags ----

#[derive(Deserialize, Clone, Debug)]
pub struct SetFlagRequest {
    pub enabled: bool,
}

// ---- health ----

#[derive(Serialize, Clone, Debug)]
pub struct HealthStorageCheck {
    pub status: String,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, Clone, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub version: &'static str,
    pub timestamp: String,
    pub uptime: u64,
    pub storage: HealthStorageCheck,
    pub scheduler_enabled: bool,
    pub response_time_ms: u32,
}
