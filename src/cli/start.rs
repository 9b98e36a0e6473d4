//! CLI entry-point for opening an investigation.

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::{info, instrument};

use crate::{config::Settings, data::investigations};

/// Args for the `start` sub-command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Owner of the investigation.
    #[arg(long)]
    pub user: String,
    /// Comma separated list of ASINs.
    #[arg(long, value_delimiter = ',', required = true)]
    pub asins: Vec<String>,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let store = super::open_store(&settings)?;
    let investigation = investigations::start_investigation(store.as_ref(), &args.user, &args.asins)
        .await
        .context("starting investigation")?;
    info!(id = %investigation.id, asins = ?investigation.asin_list, "investigation ready");
    println!("{}", investigation.id);
    Ok(())
}
