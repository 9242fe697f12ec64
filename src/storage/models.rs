//! Domain enums stored as strings in the database, plus pagination types.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::errors::{Result, SeoHubError};

/// 解析存储在数据库/请求中的枚举字符串，失败时返回校验错误
pub fn parse_enum<T>(field: &str, value: &str) -> Result<T>
where
    T: FromStr + strum::IntoEnumIterator + AsRef<str>,
{
    T::from_str(value).map_err(|_| {
        let allowed: Vec<String> = T::iter().map(|v| v.as_ref().to_string()).collect();
        SeoHubError::validation(format!(
            "invalid {}: '{}' (expected one of: {})",
            field,
            value,
            allowed.join(", ")
        ))
    })
}

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash,
            Serialize, Deserialize, EnumIter, EnumString, AsRefStr, Display,
        )]
        #[serde(rename_all = "snake_case")]
        #[strum(serialize_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }
    };
}

string_enum!(
    /// Member role inside an agency, ordered owner > admin > member
    Role { Owner, Admin, Member }
);

impl Role {
    fn rank(self) -> u8 {
        match self {
            Role::Owner => 3,
            Role::Admin => 2,
            Role::Member => 1,
        }
    }

    /// 角色是否至少为 `other`
    pub fn at_least(self, other: Role) -> bool {
        self.rank() >= other.rank()
    }
}

string_enum!(
    /// Lifecycle of an SEO request
    RequestStatus { Pending, InProgress, Completed, Cancelled }
);

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Cancelled)
    }

    /// 允许的状态迁移；迁移到自身不算合法
    pub fn can_transition_to(self, to: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, to),
            (Pending, InProgress)
                | (Pending, Completed)
                | (Pending, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Cancelled)
        )
    }
}

string_enum!(ServiceType {
    TechnicalAudit,
    KeywordResearch,
    ContentWriting,
    LinkBuilding,
    LocalSeo,
    OnPage,
    Reporting,
});

string_enum!(Priority { Low, Normal, High, Urgent });

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

string_enum!(ScheduleStatus { Active, Paused });

string_enum!(ExecutionStatus { Queued, Running, Completed, Failed });

string_enum!(
    /// What enqueued an execution
    TriggerKind { Scheduled, Manual, Retry }
);

string_enum!(EscalationSeverity { Low, Medium, High, Critical });

string_enum!(EscalationStatus { Open, Acknowledged, Resolved });

string_enum!(MessageRole { System, User, Assistant });

string_enum!(
    /// Outcome recorded for an inbound webhook event
    WebhookOutcome { Processed, Ignored, Failed }
);

/// Fulfillment vendor event types
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, EnumString, AsRefStr, Display,
)]
pub enum WebhookEventType {
    #[serde(rename = "task.started")]
    #[strum(serialize = "task.started")]
    TaskStarted,
    #[serde(rename = "task.completed")]
    #[strum(serialize = "task.completed")]
    TaskCompleted,
    #[serde(rename = "task.failed")]
    #[strum(serialize = "task.failed")]
    TaskFailed,
}

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

/// 分页参数（page 从 1 开始）
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageRequest {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl PageRequest {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
        }
    }

    /// 校验并返回 (page, page_size)
    pub fn resolve(&self) -> Result<(u64, u64)> {
        let page = self.page.unwrap_or(1);
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page == 0 {
            return Err(SeoHubError::validation("page must be >= 1"));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(SeoHubError::validation(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        Ok((page, page_size))
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// 分页结果
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, page: u64, page_size: u64, total: u64) -> Self {
        Self {
            items,
            page,
            page_size,
            total,
            total_pages: total.div_ceil(page_size.max(1)),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}
