pub mod agency;
pub mod conversation;
pub mod escalation;
pub mod feature_flag;
pub mod invite;
pub mod message;
pub mod report_execution;
pub mod report_schedule;
pub mod request_event;
pub mod seo_request;
pub mod user;
pub mod webhook_event;

pub use agency::Entity as AgencyEntity;
pub use conversation::Entity as ConversationEntity;
pub use escalation::Entity as EscalationEntity;
pub use feature_flag::Entity as FeatureFlagEntity;
pub use invite::Entity as InviteEntity;
pub use message::Entity as MessageEntity;
pub use report_execution::Entity as ReportExecutionEntity;
pub use report_schedule::Entity as ReportScheduleEntity;
pub use request_event::Entity as RequestEventEntity;
pub use seo_request::Entity as SeoRequestEntity;
pub use user::Entity as UserEntity;
pub use webhook_event::Entity as WebhookEventEntity;
