//! HTTP 层：JWT、中间件与 `/api/v1` 端点

pub mod constants;
pub mod jwt;
pub mod middleware;
pub mod services;
