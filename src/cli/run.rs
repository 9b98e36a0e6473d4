//! CLI entry-point for running the pipeline over one investigation.

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::{info, instrument, warn};

use crate::{config::Settings, pipeline::Pipeline};

/// Args for the `run` sub-command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Investigation id returned by `start`.
    #[arg(long)]
    pub investigation: String,
    /// Number of clusters; defaults to DEFAULT_CLUSTERS.
    #[arg(long)]
    pub clusters: Option<usize>,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let k = args.clusters.unwrap_or(settings.default_clusters);
    let pipeline = Pipeline::from_settings(&settings)?;
    let outcome = pipeline
        .run(&args.investigation, k)
        .await
        .with_context(|| format!("running investigation {}", args.investigation))?;

    if outcome.is_empty() {
        warn!(stage = %outcome.stage, "nothing to cluster");
    } else {
        info!(
            clusters = outcome.clusters,
            labeled = outcome.labels.labels.len(),
            failed_labels = outcome.labels.failures.len(),
            "run complete"
        );
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
