mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use customer_master::{CustomerMasterLocalClient, Service, config};
use customer_master_sdk::{CustomerMasterClientV1, HealthReport};

/// Customer master adapter - inspect configuration and probe subsystems
#[derive(Parser)]
#[command(name = "customer-master")]
#[command(version)]
struct Cli {
    /// Path to a YAML configuration file (CMA__* env vars override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration and print it with secrets redacted
    Check,
    /// Print the effective configuration for one target
    Resolve {
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        subsystem: String,
        /// Environment tier (defaults to the configured one)
        #[arg(long = "env")]
        environment: Option<String>,
    },
    /// Probe every configured subsystem of a country
    Health {
        #[arg(long)]
        country: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_json)?;

    let config = config::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Check => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Resolve {
            country,
            subsystem,
            environment,
        } => {
            let svc = Service::new(config)?;
            let resolved = svc.resolve(&subsystem, country.as_deref(), environment.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&resolved)?);
        }
        Commands::Health { country } => {
            let client = CustomerMasterLocalClient::new(Arc::new(Service::new(config)?));
            tracing::info!(country = ?country, "Probing subsystem health");
            let report = client.check_all_health(country.as_deref()).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            ensure_healthy(&report)?;
        }
    }

    Ok(())
}

/// Fail with the names of every unhealthy subsystem, so the process exits
/// non-zero after output and logs are flushed.
fn ensure_healthy(report: &HealthReport) -> Result<()> {
    let unhealthy: Vec<&str> = report
        .iter()
        .filter(|(_, healthy)| !**healthy)
        .map(|(name, _)| name.as_str())
        .collect();
    if !unhealthy.is_empty() {
        anyhow::bail!("unhealthy subsystems: {}", unhealthy.join(", "));
    }
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn parses_resolve() {
        let cli = Cli::try_parse_from([
            "customer-master",
            "-vv",
            "resolve",
            "--country",
            "US",
            "--subsystem",
            "profile",
            "--env",
            "prod",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Resolve {
                country,
                subsystem,
                environment,
            } => {
                assert_eq!(country.as_deref(), Some("US"));
                assert_eq!(subsystem, "profile");
                assert_eq!(environment.as_deref(), Some("prod"));
            }
            _ => panic!("expected resolve"),
        }
    }

    #[test]
    fn unhealthy_report_is_an_error() {
        let mut report = HealthReport::new();
        report.insert("product".to_owned(), true);
        assert!(ensure_healthy(&report).is_ok());

        report.insert("preferences".to_owned(), false);
        report.insert("eservices".to_owned(), false);
        let err = ensure_healthy(&report).unwrap_err();
        assert_eq!(err.to_string(), "unhealthy subsystems: eservices, preferences");
    }

    #[test]
    fn subsystem_required_for_resolve() {
        assert!(Cli::try_parse_from(["customer-master", "resolve"]).is_err());
    }

    #[test]
    fn health_country_optional() {
        let cli = Cli::try_parse_from(["customer-master", "--log-json", "health"]).unwrap();
        assert!(cli.log_json);
        assert!(matches!(cli.command, Commands::Health { country: None }));
    }
}
