//! `/api/v1` 端点
//!
//! - 认证（注册、登录、刷新、当前用户）
//! - 机构、成员、邀请、onboarding
//! - 需求单、报告调度、升级工单
//! - AI 对话、功能开关、统计
//! - 履约方 webhook

mod agency;
pub mod auth;
mod chat;
pub mod error_code;
mod escalations;
mod flags;
mod helpers;
mod reports;
mod requests;
pub mod routes;
mod stats;
mod types;
mod webhooks;

// 重新导出类型
pub use types::*;

// 重新导出帮助函数
pub use helpers::{
    api_created, api_paginated, api_result, error_from_seohub, error_response, json_config,
    query_config, success_response,
};

// 重新导出错误码
pub use error_code::ErrorCode;

pub use routes::api_v1_routes;
