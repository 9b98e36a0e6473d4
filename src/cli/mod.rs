//! Command-line interface wiring for review-lens.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::{
    config::Settings,
    data::{files::FileStore, DocumentStore},
};

pub mod report;
pub mod run;
pub mod serve;
pub mod start;

/// Top-level CLI definition.
#[derive(Debug, Parser)]
#[command(author, version, about = "Cluster and label product reviews", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Parse CLI arguments from the environment.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Dispatch the selected sub-command.
    pub async fn dispatch(self, settings: Settings) -> Result<()> {
        match self.command {
            Commands::Start(args) => start::run(args, settings).await,
            Commands::Run(args) => run::run(args, settings).await,
            Commands::Report(args) => report::run(args, settings).await,
            Commands::Serve(args) => serve::run(args, settings).await,
        }
    }
}

/// Supported sub-commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Open an investigation over a set of products.
    Start(start::Args),
    /// Run the clustering pipeline for an investigation.
    Run(run::Args),
    /// Print or export the cluster report of a completed investigation.
    Report(report::Args),
    /// Serve the JSON API.
    Serve(serve::Args),
}

/// File-backed store rooted under the configured data directory.
pub(crate) fn open_store(settings: &Settings) -> Result<Arc<dyn DocumentStore>> {
    let store = FileStore::open(settings).context("opening document store")?;
    Ok(Arc::new(store))
}
