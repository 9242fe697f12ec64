//! create-agency command

use std::sync::Arc;

use colored::Colorize;

use crate::interfaces::cli::CliError;
use crate::services::AgencyService;
use crate::services::agency_service::RegisterAgencyInput;
use crate::storage::Storage;

/// 直接创建机构与 owner，不受 `auth.allow_registration` 限制
pub async fn create_agency(
    storage: Arc<Storage>,
    name: String,
    email: String,
    owner_name: Option<String>,
    password: String,
) -> Result<(), CliError> {
    let owner_name = owner_name.unwrap_or_else(|| {
        email
            .split('@')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("owner")
            .to_string()
    });

    let service = AgencyService::new(storage);
    let (agency, owner) = service
        .create_agency(RegisterAgencyInput {
            agency_name: name,
            email,
            name: owner_name,
            password,
        })
        .await?;

    println!("{} Agency created", "✓".bold().green());
    println!("  {} {}", "id:".dimmed(), agency.id.cyan());
    println!("  {} {}", "slug:".dimmed(), agency.slug.cyan());
    println!(
        "  {} {} ({})",
        "owner:".dimmed(),
        owner.email.blue(),
        owner.id.dimmed()
    );
    Ok(())
}
