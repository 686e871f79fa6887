//! osync CLI - one-shot reconciliation between a local markdown tree and
//! a remote Outline collection.

mod cli;
mod error;
mod select;

use clap::Parser;

use osync_core::{Config, OutlineGateway, StateStore};

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "osync=debug" } else { "osync=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_filter.parse().expect("valid directive")),
        )
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_required(path)?,
        None => Config::load(None)?,
    };

    let root = cli.root.clone().unwrap_or_else(|| config.sync_dir.clone());
    let gateway = OutlineGateway::new(&config.api_url, &config.api_token)?;

    let remembered = StateStore::new(&root).load().collection_id;
    let configured = cli.collection.clone().or(config.collection_id.clone());
    let collection_id = select::resolve_collection(&gateway, configured, remembered).await?;

    let report = osync_core::sync::run(&gateway, &root, &collection_id, cli.dry_run).await?;

    if report.halted_by_conflict() {
        println!(
            "Sync halted: {} conflict(s) need out-of-band resolution.",
            report.conflicts.len()
        );
        for conflict in &report.conflicts {
            println!("  {conflict}");
        }
        return Ok(());
    }

    if report.dry_run {
        if report.planned.is_empty() {
            println!("Nothing to do.");
        } else {
            println!("Planned operations:");
            for operation in &report.planned {
                println!("  {operation}");
            }
        }
        return Ok(());
    }

    println!("Sync completed: {}", report.summary());
    Ok(())
}
