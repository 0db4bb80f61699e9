use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use portal_migrate_core::MigrationPlan;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "portal-migrate", version)]
#[command(about = "Migrate Notion databases into Directus collections", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the migration
    Migrate {
        /// Only run this module
        #[arg(short, long)]
        module: Option<String>,
        /// Extract and transform without writing anything
        #[arg(long)]
        dry_run: bool,
        /// Write the JSON report to this path
        #[arg(short, long)]
        report: Option<PathBuf>,
        /// TOML plan file; defaults to the built-in module mapping
        #[arg(short, long)]
        plan: Option<PathBuf>,
    },
    /// Print the module mapping without contacting either API
    Plan {
        #[arg(short, long)]
        plan: Option<PathBuf>,
    },
}

/// The plan from `path`, or the built-in mapping, with `PORTAL_MIGRATE_*` overrides applied.
pub(crate) fn load_plan(path: Option<&Path>) -> Result<MigrationPlan> {
    let mut plan = match path {
        Some(path) => MigrationPlan::load(path)?,
        None => MigrationPlan::builtin_from_env(),
    };
    plan.settings = plan.settings.with_env_overrides();
    plan.validate()?;
    tracing::debug!(modules = plan.modules().len(), batch_size = plan.settings.batch_size, "plan loaded");
    Ok(plan)
}

pub(crate) fn required_env(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("{name} environment variable must be set"))
}

pub(crate) fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty()).unwrap_or_else(|| default.to_owned())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate { module, dry_run, report, plan } => {
            commands::migrate::run(commands::migrate::MigrateArgs { module, dry_run, report, plan }).await?;
        },
        Commands::Plan { plan } => commands::plan::run(plan.as_deref())?,
    }

    Ok(())
}
