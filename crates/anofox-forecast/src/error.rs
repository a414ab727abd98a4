//! Error taxonomy for the forecasting engine.

use thiserror::Error;

/// Result type for all core entry points.
pub type Result<T> = std::result::Result<T, ErrorKind>;

/// Error kinds raised by `create`, `fit` and `predict`.
///
/// The batch dispatcher (`crate::batch`) matches on these directly rather
/// than through a numeric code — that mapping is host/FFI-level glue and
/// lives outside this crate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorKind {
    #[error("invalid parameter '{param}' = {value}: {reason}")]
    InvalidParameter {
        param: String,
        value: String,
        reason: String,
    },

    #[error("insufficient data: need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("non-finite observation: {0}")]
    NonFiniteObservation(String),

    #[error("model fit failed: {0}")]
    ModelFitFailed(String),

    #[error("predict called before fit")]
    PredictBeforeFit,

    #[error("cancelled")]
    Cancelled,
}

impl ErrorKind {
    /// Short, stable tag used as the `error_kind` column in batch result rows.
    pub fn tag(&self) -> &'static str {
        match self {
            ErrorKind::InvalidParameter { .. } => "InvalidParameter",
            ErrorKind::InsufficientData { .. } => "InsufficientData",
            ErrorKind::NonFiniteObservation(_) => "NonFiniteObservation",
            ErrorKind::ModelFitFailed(_) => "ModelFitFailed",
            ErrorKind::PredictBeforeFit => "PredictBeforeFit",
            ErrorKind::Cancelled => "Cancelled",
        }
    }
}
