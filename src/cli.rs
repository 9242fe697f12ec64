//! Command-line interface definitions using clap
//!
//! This module defines the CLI structure for seohub using clap's derive macros.

use clap::{Parser, Subcommand};

/// SEO Hub - multi-tenant backend for SEO agencies
#[derive(Parser)]
#[command(name = "seohub")]
#[command(version)]
#[command(about = "Multi-tenant backend for SEO agencies", long_about = None)]
pub struct Cli {
    /// Configuration file path (default: config.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server and report scheduler (default)
    Serve,

    /// Run pending database migrations and exit
    Migrate,

    /// Create an agency together with its owner account
    CreateAgency {
        /// Agency display name
        name: String,

        /// Owner email
        #[arg(long)]
        email: String,

        /// Owner display name (default: the email's local part)
        #[arg(long)]
        owner_name: Option<String>,

        /// Owner password
        #[arg(long)]
        password: String,
    },

    /// Manage feature flags
    Flags {
        #[command(subcommand)]
        action: FlagCommands,
    },

    /// Report schedule maintenance
    Schedules {
        #[command(subcommand)]
        action: ScheduleCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Feature flag commands
#[derive(Subcommand)]
pub enum FlagCommands {
    /// Show resolved flags (globally, or for one agency)
    List {
        /// Agency id
        #[arg(long)]
        agency: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Set a flag override
    Set {
        /// Flag key (e.g. ai_chat)
        key: String,

        /// true / false
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,

        /// Agency id (default: global override)
        #[arg(long)]
        agency: Option<String>,
    },

    /// Remove a flag override
    Unset {
        /// Flag key
        key: String,

        /// Agency id (default: global override)
        #[arg(long)]
        agency: Option<String>,
    },
}

/// Schedule commands
#[derive(Subcommand)]
pub enum ScheduleCommands {
    /// Run one scheduler tick now and print its summary
    Tick,
}

/// Configuration management commands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: config.example.toml)
        output_path: Option<String>,

        /// Force overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_no_command() {
        let cli = Cli::try_parse_from(["seohub"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_flags_set_parses_bool() {
        let cli =
            Cli::try_parse_from(["seohub", "flags", "set", "ai_chat", "false", "--agency", "a1"])
                .unwrap();
        match cli.command {
            Some(Commands::Flags {
                action: FlagCommands::Set { key, enabled, agency },
            }) => {
                assert_eq!(key, "ai_chat");
                assert!(!enabled);
                assert_eq!(agency.as_deref(), Some("a1"));
            }
            _ => panic!("unexpected command"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["seohub", "migrate", "--config", "/etc/seohub.toml"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("/etc/seohub.toml"));
        assert!(matches!(cli.command, Some(Commands::Migrate)));
    }
}
