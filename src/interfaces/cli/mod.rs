//! CLI interface module
//!
//! Maintenance commands that talk to the database directly.

pub mod commands;

use crate::cli::{Commands, ConfigCommands, FlagCommands, ScheduleCommands};
use crate::storage::StorageFactory;
use std::fmt;

#[derive(Debug)]
pub enum CliError {
    StorageError(String),
    CommandError(String),
}

impl CliError {
    /// Format as simple output
    pub fn format_simple(&self) -> String {
        match self {
            CliError::StorageError(msg) => format!("Storage error: {}", msg),
            CliError::CommandError(msg) => format!("Command error: {}", msg),
        }
    }

    /// Format as colored output
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        match self {
            CliError::StorageError(msg) => {
                format!("{} {}", "Storage error:".red().bold(), msg.white())
            }
            CliError::CommandError(msg) => {
                format!("{} {}", "Command error:".red().bold(), msg.white())
            }
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for CliError {}

impl From<crate::errors::SeoHubError> for CliError {
    fn from(err: crate::errors::SeoHubError) -> Self {
        match err {
            crate::errors::SeoHubError::DatabaseConfig(_)
            | crate::errors::SeoHubError::DatabaseConnection(_)
            | crate::errors::SeoHubError::DatabaseOperation(_) => {
                CliError::StorageError(err.to_string())
            }
            other => CliError::CommandError(other.to_string()),
        }
    }
}

/// Run a CLI command from clap-parsed input
///
/// `Serve` is handled by the server mode and never reaches here.
pub async fn run_cli_command(cmd: Commands) -> Result<(), CliError> {
    // Generate doesn't need a DB connection
    if let Commands::Config {
        action: ConfigCommands::Generate { output_path, force },
    } = cmd
    {
        return commands::config_generate(output_path, force).await;
    }

    // 连接时会自动执行迁移
    let storage = StorageFactory::create().await?;

    let result = match cmd {
        Commands::Migrate => {
            println!("Database migrations are up to date ({})", storage.backend_name());
            Ok(())
        }
        Commands::CreateAgency {
            name,
            email,
            owner_name,
            password,
        } => commands::create_agency(storage.clone(), name, email, owner_name, password).await,
        Commands::Flags { action } => match action {
            FlagCommands::List { agency, json } => {
                commands::list_flags(storage.clone(), agency, json).await
            }
            FlagCommands::Set {
                key,
                enabled,
                agency,
            } => commands::set_flag(storage.clone(), key, enabled, agency).await,
            FlagCommands::Unset { key, agency } => {
                commands::unset_flag(storage.clone(), key, agency).await
            }
        },
        Commands::Schedules {
            action: ScheduleCommands::Tick,
        } => commands::tick_once(storage.clone()).await,
        Commands::Serve | Commands::Config { .. } => Err(CliError::CommandError(
            "Command is not handled by the CLI runner".to_string(),
        )),
    };

    storage.close().await?;
    result
}
