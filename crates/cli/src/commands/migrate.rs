//! The `migrate` command: build both API clients and run the plan.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use portal_migrate_directus::DirectusClient;
use portal_migrate_engine::MigrationOrchestrator;
use portal_migrate_notion::NotionClient;

use crate::{env_or, load_plan, required_env};

pub(crate) struct MigrateArgs {
    pub module: Option<String>,
    pub dry_run: bool,
    pub report: Option<PathBuf>,
    pub plan: Option<PathBuf>,
}

pub(crate) async fn run(args: MigrateArgs) -> Result<()> {
    let plan = load_plan(args.plan.as_deref())?;
    if let Some(name) = args.module.as_deref()
        && plan.module(name).is_none()
    {
        let known: Vec<_> = plan.modules().iter().map(|m| m.name.as_str()).collect();
        anyhow::bail!("unknown module '{name}' (known: {})", known.join(", "));
    }

    let notion = NotionClient::new(
        required_env("NOTION_API_KEY")?,
        env_or("NOTION_API_URL", portal_migrate_notion::DEFAULT_BASE_URL),
    )?;
    let directus = DirectusClient::new(
        required_env("DIRECTUS_TOKEN")?,
        env_or("DIRECTUS_URL", portal_migrate_directus::DEFAULT_BASE_URL),
    )?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping after the current module");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let orchestrator = MigrationOrchestrator::new(plan, Arc::new(notion), Arc::new(directus))
        .with_dry_run(args.dry_run)
        .with_shutdown(shutdown);
    orchestrator.preflight().await?;

    let report = match args.module.as_deref() {
        Some(name) => orchestrator.execute_module(name).await?,
        None => orchestrator.execute().await,
    };

    println!("{}", report.render_summary());
    if let Some(path) = args.report.as_deref() {
        report.write_json(path)?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}
