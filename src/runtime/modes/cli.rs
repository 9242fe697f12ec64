//! CLI mode
//!
//! Delegates maintenance subcommands to the CLI interface.

use crate::cli::Commands;
use crate::interfaces::cli::CliError;

/// Run CLI mode
pub async fn run_cli(cmd: Commands) -> Result<(), CliError> {
    crate::interfaces::cli::run_cli_command(cmd).await
}
