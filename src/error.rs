// src/error.rs
use std::fmt;

/// Closed error taxonomy for a pipeline run.
///
/// `Fetch` never escapes the coordinator — a single failed source only
/// reduces the batch. `Storage` is fatal when the seen-set cannot be loaded
/// and contained when a post-delivery append/prune fails. `Delivery` and
/// `AllSourcesFailed` abort the run.
#[derive(Debug)]
pub enum PipelineError {
    Config(String),

    Fetch {
        source: String,
        attempts: u32,
        message: String,
    },

    AllSourcesFailed(usize),

    Storage(String),

    Delivery(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Config(msg) => write!(f, "configuration error: {msg}"),
            PipelineError::Fetch {
                source,
                attempts,
                message,
            } => write!(
                f,
                "source '{source}' failed after {attempts} attempts: {message}"
            ),
            PipelineError::AllSourcesFailed(count) => {
                write!(f, "all {count} enabled sources exhausted their retries")
            }
            PipelineError::Storage(msg) => write!(f, "seen-store failure: {msg}"),
            PipelineError::Delivery(msg) => write!(f, "delivery failed: {msg}"),
        }
    }
}

impl std::error::Error for PipelineError {}

pub type Result<T> = std::result::Result<T, PipelineError>;
