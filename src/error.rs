//! Error taxonomy shared by every pipeline stage.

use thiserror::Error;

/// Stage names used when a whole run has to be aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Started,
    Extracted,
    Cleaned,
    Embedded,
    Clustered,
    Labeled,
    Persisted,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Started => "started",
            Self::Extracted => "extracted",
            Self::Cleaned => "cleaned",
            Self::Embedded => "embedded",
            Self::Clustered => "clustered",
            Self::Labeled => "labeled",
            Self::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed input: wrong shape, bad identifier, inconsistent parameters.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("record is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("{collection}/{id} not found")]
    NotFound { collection: String, id: String },

    /// Transport or API failure from the embedding or completion service.
    #[error("service error: {0}")]
    Service(String),

    #[error("batch of {size} writes exceeds store limit of {limit}")]
    Capacity { size: usize, limit: usize },

    #[error("pipeline failed at {stage}: {reason}")]
    PipelineFailure { stage: Stage, reason: String },

    #[error("store error: {0}")]
    Store(String),
}

impl PipelineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(collection: &str, id: &str) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub fn failure(stage: Stage, reason: impl Into<String>) -> Self {
        Self::PipelineFailure {
            stage,
            reason: reason.into(),
        }
    }

    /// True when the caller supplied bad input rather than the system failing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::MissingField(_))
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(format!("json: {err}"))
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        Self::Store(format!("io: {err}"))
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        Self::Service(err.to_string())
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
