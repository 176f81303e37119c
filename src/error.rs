//! Error taxonomy for scoring, aggregation and cleaning

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the library.
///
/// Artifact errors are fatal for the process, column errors are fatal for a
/// batch run, coercion errors fail a single request.
#[derive(Debug, Error)]
pub enum RiskError {
    #[error("model artifact not found: {}", path.display())]
    ArtifactNotFound { path: PathBuf },

    #[error("pipeline has no step named '{0}'")]
    StageNotFound(String),

    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("table '{table}' is missing columns: {columns:?}")]
    MissingColumns { table: String, columns: Vec<String> },

    #[error("cannot coerce feature '{field}': {reason}")]
    Coercion { field: String, reason: String },

    #[error("cannot cast column '{column}': {reason}")]
    Cast { column: String, reason: String },

    #[error("quantile range [{lower}, {upper}] must satisfy 0 <= lower <= upper <= 1")]
    QuantileRange { lower: f64, upper: f64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Polars(#[from] polars::prelude::PolarsError),
}

impl From<ort::Error> for RiskError {
    fn from(e: ort::Error) -> Self {
        RiskError::Inference(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RiskError>;
