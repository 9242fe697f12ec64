pub mod auth;
pub mod request_id;

pub use auth::JwtAuth;
pub use request_id::{RequestId, RequestIdMiddleware};
