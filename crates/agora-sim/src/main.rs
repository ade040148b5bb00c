//! Synthetic workload driver for the agora engine.

mod config;
mod workload;
mod zipf;

use agora_core::EngineBuilder;
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Args;
use crate::workload::Simulator;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,agora_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let args = Args::parse();
    tracing::info!(?args, "Starting agora simulation");

    let handle = EngineBuilder::new().with_config(args.engine_config()).build().start();
    let simulator = Simulator::new(handle.client(), &args)?;
    let summary = simulator.run().await.context("simulation failed")?;

    if args.report {
        println!("{}", handle.print_user_actions().await?);
        println!("{}", handle.print_subreddits().await?);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary.stats)?);
    } else {
        println!("{}", summary.stats);
    }

    let mut rejected: Vec<_> = summary.rejected.iter().collect();
    rejected.sort_by_key(|(kind, _)| format!("{:?}", kind));
    for (kind, count) in rejected {
        tracing::info!(kind = ?kind, count, "rejected actions");
    }
    println!(
        "Simulation completed in {:?}: {} applied, {} unchanged, {} rejected.",
        summary.elapsed,
        summary.applied,
        summary.unchanged,
        summary.rejected.values().sum::<usize>()
    );

    handle
        .shutdown()
        .await
        .context("engine did not shut down cleanly")?;
    Ok(())
}
