//! CLI entry-point for reading back cluster insights.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use crate::{clusters::insights, config::Settings, pipeline};

/// Args for the `report` sub-command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    #[arg(long)]
    pub investigation: String,
    /// Also write the report as CSV; relative paths land in OUTPUTS_DIR.
    #[arg(long)]
    pub csv: Option<PathBuf>,
    /// Print attribute clusters and problem statements instead of review clusters.
    #[arg(long, conflicts_with = "csv")]
    pub attributes: bool,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let store = super::open_store(&settings)?;
    if args.attributes {
        let report = pipeline::load_attribute_report(store.as_ref(), &args.investigation)
            .await
            .with_context(|| format!("loading attribute report for {}", args.investigation))?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    let report = pipeline::load_report(store.as_ref(), &args.investigation)
        .await
        .with_context(|| format!("loading report for {}", args.investigation))?;

    if let Some(path) = args.csv {
        let path = if path.is_absolute() {
            path
        } else {
            settings.join_output(path)
        };
        insights::write_csv_file(&report, &path)?;
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
