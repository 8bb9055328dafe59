use crate::batch::{Batch, Mode, Scope};
use crate::error::{FitError, Result};
use crate::model::{Beta, EnergyModel};
use crate::numeric::{self, BoundaryPolicy};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::distributions::WeightedIndex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which model operator advances the particle ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMethod {
    /// True Markov transitions (`EnergyModel::markov_chain`).
    #[default]
    Stochastic,
    /// Mean-field expectation propagation.
    MeanField,
    /// Deterministic fixed-point iteration.
    Deterministic,
}

impl FromStr for UpdateMethod {
    type Err = FitError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stochastic" => Ok(Self::Stochastic),
            "mean_field" => Ok(Self::MeanField),
            "deterministic" => Ok(Self::Deterministic),
            other => Err(FitError::UnknownMethod(other.to_string())),
        }
    }
}

impl fmt::Display for UpdateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stochastic => write!(f, "stochastic"),
            Self::MeanField => write!(f, "mean_field"),
            Self::Deterministic => write!(f, "deterministic"),
        }
    }
}

/// Random-walk parameters for the per-particle temperatures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperingConfig {
    /// Drift toward beta = 1 per update; also scales the Gaussian noise.
    pub beta_step: f32,
    pub boundary: BoundaryPolicy,
}

impl Default for TemperingConfig {
    fn default() -> Self {
        Self {
            beta_step: 0.01,
            boundary: BoundaryPolicy::Clamp,
        }
    }
}

impl TemperingConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.beta_step.is_finite() || self.beta_step < 0.0 {
            return Err(FitError::InvalidConfig(format!(
                "beta_step must be finite and non-negative, got {}",
                self.beta_step
            )));
        }
        Ok(())
    }
}

/// A particle ensemble that can be advanced and read back.
///
/// `get_state` returns an owned matrix; callers never alias the sampler's
/// internal buffer.
pub trait Sampler {
    fn update_state<M: EnergyModel + ?Sized>(&mut self, model: &M, steps: usize) -> Result<()>;

    fn get_state<M: EnergyModel + ?Sized>(&mut self, model: &M) -> Result<Array2<f32>>;

    /// Read-only view of the current ensemble.
    fn state(&self) -> ArrayView2<'_, f32>;
}

fn advance<M: EnergyModel + ?Sized>(
    model: &M,
    method: UpdateMethod,
    state: &Array2<f32>,
    steps: usize,
    beta: Beta<'_>,
    rng: &mut ChaCha8Rng,
) -> Result<Array2<f32>> {
    let next = match method {
        UpdateMethod::Stochastic => model.markov_chain(state, steps, beta, rng),
        UpdateMethod::MeanField => model.mean_field_iteration(state, steps, beta),
        UpdateMethod::Deterministic => model.deterministic_iteration(state, steps, beta),
    };
    if next.dim() != state.dim() {
        return Err(FitError::ShapeMismatch {
            expected: state.dim(),
            got: next.dim(),
        });
    }
    Ok(next)
}

fn first_train_batch<B: Batch + ?Sized>(batch: &mut B) -> Result<Array2<f32>> {
    let data = batch.get(Mode::Train).ok_or(FitError::EmptyBatch)?;
    batch.reset_generator(Scope::All);
    Ok(data)
}

// ── Plain chain ─────────────────────────────────────────────────────

/// Sequential Monte Carlo chain run at full temperature.
#[derive(Debug, Clone)]
pub struct ChainSampler {
    state: Array2<f32>,
    method: UpdateMethod,
    rng: ChaCha8Rng,
}

impl ChainSampler {
    pub fn new(initial: Array2<f32>, method: UpdateMethod, seed: u64) -> Self {
        tracing::debug!(particles = initial.nrows(), %method, "chain sampler created");
        Self {
            state: initial,
            method,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Start from double-precision data, narrowed to `f32`.
    pub fn from_f64(initial: &Array2<f64>, method: UpdateMethod, seed: u64) -> Self {
        Self::new(initial.mapv(|v| v as f32), method, seed)
    }

    /// Start from the next training mini-batch and leave `batch` re-armed
    /// for a full pass.
    pub fn from_batch<B: Batch + ?Sized>(
        batch: &mut B,
        method: UpdateMethod,
        seed: u64,
    ) -> Result<Self> {
        Ok(Self::new(first_train_batch(batch)?, method, seed))
    }

    pub fn method(&self) -> UpdateMethod {
        self.method
    }
}

impl Sampler for ChainSampler {
    fn update_state<M: EnergyModel + ?Sized>(&mut self, model: &M, steps: usize) -> Result<()> {
        self.state = advance(
            model,
            self.method,
            &self.state,
            steps,
            Beta::Full,
            &mut self.rng,
        )?;
        Ok(())
    }

    fn get_state<M: EnergyModel + ?Sized>(&mut self, _model: &M) -> Result<Array2<f32>> {
        Ok(self.state.clone())
    }

    fn state(&self) -> ArrayView2<'_, f32> {
        self.state.view()
    }
}

// ── Tempered chain with importance resampling ───────────────────────

/// Simulated tempering with annealed importance resampling.
///
/// Every particle carries its own inverse temperature which drifts toward 1
/// with Gaussian noise. `get_state` corrects for the tempering by weighting
/// each particle with `exp(F_beta - F_1)` and drawing a multinomial resample
/// of the ensemble.
#[derive(Debug, Clone)]
pub struct TemperedSampler {
    state: Array2<f32>,
    beta: Array1<f32>,
    method: UpdateMethod,
    tempering: TemperingConfig,
    rng: ChaCha8Rng,
}

impl TemperedSampler {
    /// Tempered sampler with the default random walk.
    pub fn new(initial: Array2<f32>, method: UpdateMethod, seed: u64) -> Self {
        Self::build(initial, method, seed, TemperingConfig::default())
    }

    /// Fails with `InvalidConfig` when `tempering` would push beta outside
    /// [0, 1].
    pub fn with_tempering(
        initial: Array2<f32>,
        method: UpdateMethod,
        seed: u64,
        tempering: TemperingConfig,
    ) -> Result<Self> {
        tempering.validate()?;
        Ok(Self::build(initial, method, seed, tempering))
    }

    fn build(
        initial: Array2<f32>,
        method: UpdateMethod,
        seed: u64,
        tempering: TemperingConfig,
    ) -> Self {
        tracing::debug!(
            particles = initial.nrows(),
            %method,
            beta_step = tempering.beta_step,
            "tempered sampler created"
        );
        Self {
            beta: Array1::ones(initial.nrows()),
            state: initial,
            method,
            tempering,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Start from the next training mini-batch and leave `batch` re-armed
    /// for a full pass.
    pub fn from_batch<B: Batch + ?Sized>(
        batch: &mut B,
        method: UpdateMethod,
        seed: u64,
        tempering: TemperingConfig,
    ) -> Result<Self> {
        tempering.validate()?;
        Ok(Self::build(first_train_batch(batch)?, method, seed, tempering))
    }

    pub fn beta(&self) -> ArrayView1<'_, f32> {
        self.beta.view()
    }

    pub fn method(&self) -> UpdateMethod {
        self.method
    }

    fn step_temperatures(&mut self) {
        let step = self.tempering.beta_step;
        let boundary = self.tempering.boundary;
        for b in self.beta.iter_mut() {
            let z: f32 = StandardNormal.sample(&mut self.rng);
            *b = boundary.apply(*b + step + step * z);
        }
    }
}

impl Sampler for TemperedSampler {
    fn update_state<M: EnergyModel + ?Sized>(&mut self, model: &M, steps: usize) -> Result<()> {
        self.step_temperatures();
        self.state = advance(
            model,
            self.method,
            &self.state,
            steps,
            Beta::Tempered(self.beta.view()),
            &mut self.rng,
        )?;
        Ok(())
    }

    fn get_state<M: EnergyModel + ?Sized>(&mut self, model: &M) -> Result<Array2<f32>> {
        let current = model.marginal_free_energy(&self.state, Beta::Tempered(self.beta.view()));
        let target = model.marginal_free_energy(&self.state, Beta::Full);
        let delta = current - target;

        let weights = numeric::exp_normalize(delta.view())?;
        let dist = WeightedIndex::<f64>::new(weights.iter())
            .map_err(|e| FitError::DegenerateWeights(e.to_string()))?;
        let n = self.state.nrows();
        let indices: Vec<usize> = (0..n).map(|_| dist.sample(&mut self.rng)).collect();
        Ok(self.state.select(Axis(0), &indices))
    }

    fn state(&self) -> ArrayView2<'_, f32> {
        self.state.view()
    }
}
