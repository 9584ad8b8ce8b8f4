//! Info command - Show version and the resolved store configuration
//!
//! Usage:
//! ```bash
//! metastore info
//! metastore --config store.toml info --check
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use metastore::{create_backend, StoreConfig};

use super::Session;
use crate::output::{report, Outcome};

/// Arguments for the info command
#[derive(Args)]
pub struct InfoArgs {
    /// Also build the backend to validate the configuration
    #[arg(long)]
    check: bool,
}

fn setting(name: &str, value: Option<&str>) {
    let value = match value {
        Some(v) => v.green(),
        None => "-".dimmed(),
    };
    println!("  {} {}", format!("{}:", name).dimmed(), value);
}

fn secret(value: Option<&str>) -> Option<&'static str> {
    value.map(|_| "(set)")
}

/// Run the info command
pub fn run(session: &Session, args: InfoArgs) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let config: StoreConfig = session.config()?;

    println!("{}", "Metastore - Data Object Access Layer".bold().cyan());
    println!("{}", "═".repeat(50).cyan());
    println!();

    println!("{}", "Version Information:".bold());
    println!("  {} {}", "CLI Version:".dimmed(), version.green());
    println!();

    println!("{}", "Configuration:".bold());
    let source = session
        .config_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "environment only".to_string());
    setting("Source", Some(source.as_str()));
    setting("Backend type", Some(config.backend_type.as_str()));
    setting("Endpoint", config.endpoint.as_deref());
    setting("Region", config.region.as_deref());
    setting("Signing service", config.signing_service.as_deref());
    setting("Key-value endpoint", config.kv_endpoint.as_deref());
    setting("Username", config.username.as_deref());
    setting("Password", secret(config.password.as_deref()));
    setting("Access key", secret(config.access_key_id.as_deref()));
    setting(
        "Multi-tenancy",
        Some(if config.multi_tenancy { "enabled" } else { "disabled" }),
    );
    setting("Tenant", session.tenant());
    setting(
        "Timeouts",
        Some(
            format!(
                "connect {} ms, read {} ms",
                config.connect_timeout_ms, config.read_timeout_ms
            )
            .as_str(),
        ),
    );
    if config.trust_self_signed {
        report(Outcome::Warning, "Self-signed certificates are trusted");
    }
    println!();

    if args.check {
        let backend = create_backend(&config)?;
        report(Outcome::Done, format!("Backend {} is ready", backend.name()));
    }

    Ok(())
}
