use std::path::PathBuf;
use thiserror::Error;

/// Failure taxonomy for the prediction engine.
///
/// `Validation` and `UnknownCategory` are fatal to a single request only;
/// inside any fan-out (batch rows, aggregated locations, forecast periods)
/// they are logged and the offending item is skipped. `ArtifactMissing` and
/// `ArtifactCorrupt` are fatal at startup. `NoLocationsAvailable` and
/// `EmptyForecast` signal that every item in a fan-out failed.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("unknown {field} '{value}' (outside trained vocabulary)")]
    UnknownCategory { field: &'static str, value: String },

    #[error("artifact not found at {}", path.display())]
    ArtifactMissing { path: PathBuf },

    #[error("artifact at {} could not be decoded: {reason}", path.display())]
    ArtifactCorrupt { path: PathBuf, reason: String },

    #[error("artifacts not loaded; call init() first")]
    ArtifactsNotLoaded,

    #[error("every per-location prediction failed for the aggregate request")]
    NoLocationsAvailable,

    #[error("no forecast period produced a usable prediction")]
    EmptyForecast,
}

impl PredictionError {
    pub fn validation(message: impl Into<String>) -> Self {
        PredictionError::Validation(message.into())
    }

    pub fn unknown_category(field: &'static str, value: &str) -> Self {
        PredictionError::UnknownCategory {
            field,
            value: value.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PredictionError>;
