//! `serve`: expose the pipeline over HTTP.

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use crate::{api, config::Settings};

#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    #[arg(long, default_value_t = 8080)]
    pub port: u16,
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    /// Cluster count for run requests that do not name one (overrides DEFAULT_CLUSTERS).
    #[arg(long)]
    pub clusters: Option<usize>,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, mut settings: Settings) -> Result<()> {
    settings.require_api_key()?;
    if let Some(k) = args.clusters {
        anyhow::ensure!(k > 0, "--clusters must be at least 1");
        settings.default_clusters = k;
    }
    api::serve(settings, args.host, args.port).await
}
