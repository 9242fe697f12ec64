//! Mode routing
//!
//! - Server mode (HTTP server + report scheduler)
//! - CLI mode (maintenance subcommands)

pub mod cli;
pub mod server;

pub use cli::run_cli;
pub use server::run_server;
