//! SEO Hub - multi-tenant backend for SEO agencies
//!
//! Agencies manage their clients' service requests, receive fulfillment
//! updates over signed webhooks, schedule recurring reports and chat with
//! an LLM assistant.
//!
//! # Architecture
//! - `api`: HTTP services, JWT auth and middleware
//! - `services`: Tenant-scoped business logic
//! - `scheduler`: Cron evaluation, report generators and the polling loop
//! - `storage`: Database connection, retry and domain models
//! - `interfaces`: Maintenance CLI
//! - `config`: Configuration management
//! - `runtime`: Application lifecycle and execution modes
//! - `system`: Logging setup

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod interfaces;
pub mod runtime;
pub mod scheduler;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
