//! Sampling and training control for energy-based models.
//!
//! Particle samplers (`sampler`) evolve an ensemble of model states, the
//! training loop (`training`) turns data and model samples into optimizer
//! updates under CD-k or PCD-k, and the monitor (`monitor`) scores the model
//! on held-out data after every epoch.

pub mod batch;
pub mod error;
pub mod model;
pub mod monitor;
pub mod numeric;
pub mod optimizer;
pub mod progress;
pub mod sampler;
pub mod training;

pub use error::{FitError, Result};

// Future: a systematic-resampling variant for TemperedSampler would lower
// the variance of get_state without changing its interface.
