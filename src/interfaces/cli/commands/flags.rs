//! Feature flag commands

use std::sync::Arc;

use colored::Colorize;

use crate::interfaces::cli::CliError;
use crate::services::{FeatureFlagService, FlagKey, FlagScope};
use crate::storage::Storage;

fn scope_of(agency: Option<String>) -> FlagScope {
    match agency {
        Some(id) => FlagScope::Agency(id),
        None => FlagScope::Global,
    }
}

fn scope_label(scope: &FlagScope) -> String {
    match scope {
        FlagScope::Global => "global".to_string(),
        FlagScope::Agency(id) => format!("agency {}", id),
    }
}

pub async fn list_flags(
    storage: Arc<Storage>,
    agency: Option<String>,
    json: bool,
) -> Result<(), CliError> {
    let service = FeatureFlagService::new(storage);
    let flags = service.list_resolved(agency.as_deref()).await?;

    if json {
        let out = serde_json::to_string_pretty(&flags)
            .map_err(|e| CliError::CommandError(e.to_string()))?;
        println!("{}", out);
        return Ok(());
    }

    println!("{}", "Feature flags:".bold().green());
    for flag in &flags {
        let value = if flag.enabled {
            "on".green()
        } else {
            "off".red()
        };
        println!(
            "  {:<20} {:<4} {}",
            flag.key.to_string().cyan(),
            value,
            format!("({:?})", flag.source).to_lowercase().dimmed()
        );
    }
    Ok(())
}

pub async fn set_flag(
    storage: Arc<Storage>,
    key: String,
    enabled: bool,
    agency: Option<String>,
) -> Result<(), CliError> {
    let key = FlagKey::parse(&key)?;
    let scope = scope_of(agency);
    FeatureFlagService::new(storage)
        .set(&scope, key, enabled)
        .await?;
    println!(
        "{} {} = {} ({})",
        "✓".bold().green(),
        key.to_string().cyan(),
        enabled,
        scope_label(&scope)
    );
    Ok(())
}

pub async fn unset_flag(
    storage: Arc<Storage>,
    key: String,
    agency: Option<String>,
) -> Result<(), CliError> {
    let key = FlagKey::parse(&key)?;
    let scope = scope_of(agency);
    let removed = FeatureFlagService::new(storage).unset(&scope, key).await?;
    if removed {
        println!(
            "{} Removed {} override for {}",
            "✓".bold().green(),
            scope_label(&scope),
            key.to_string().cyan()
        );
    } else {
        println!(
            "{} No {} override for {}",
            "ℹ".bold().blue(),
            scope_label(&scope),
            key.to_string().cyan()
        );
    }
    Ok(())
}
