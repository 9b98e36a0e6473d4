//! Review clustering pipeline: turns raw product reviews into labeled topic clusters.

pub mod api;
pub mod cli;
pub mod clusters;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod nlp;
pub mod pipeline;
pub mod pool;

pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, PipelineOutcome};
