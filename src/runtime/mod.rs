//! Process lifetime: startup, run modes and graceful shutdown.

pub mod lifetime;
pub mod modes;
