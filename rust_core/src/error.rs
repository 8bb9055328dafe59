use thiserror::Error;

/// Errors raised by the samplers, the monitor and the training loop.
#[derive(Debug, Error)]
pub enum FitError {
    #[error("unknown update method {0:?} (expected stochastic, mean_field or deterministic)")]
    UnknownMethod(String),

    #[error("model returned an ensemble of shape {got:?}, expected {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("batch reports zero validation samples")]
    NoValidationSamples,

    #[error("importance weights are degenerate: {0}")]
    DegenerateWeights(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("batch yielded no training data")]
    EmptyBatch,
}

pub type Result<T> = std::result::Result<T, FitError>;
