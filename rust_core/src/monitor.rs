//! Gradient-free training diagnostics.
//!
//! Two quantities are tracked on the validation partition:
//!   - reconstruction error: squared distance between the data and one
//!     sampling step started from the data;
//!   - energy distance (Székely & Rizzo 2013) between the data and samples
//!     the model generates from scratch.

use crate::batch::{Batch, Mode};
use crate::error::{FitError, Result};
use crate::model::EnergyModel;
use crate::numeric;
use crate::progress::{Progress, ProgressLog};
use crate::sampler::{ChainSampler, Sampler, UpdateMethod};
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// `check_progress` only runs for indices that are multiples of this.
    pub skip: usize,
    /// Sampling steps applied to model-generated samples before comparing.
    pub update_steps: usize,
    /// Maximum rows per sample entering the energy-distance estimate.
    pub downsample: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            skip: 100,
            update_steps: 10,
            downsample: 100,
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.skip == 0 {
            return Err(FitError::InvalidConfig("skip must be at least 1".into()));
        }
        if self.downsample == 0 {
            return Err(FitError::InvalidConfig(
                "downsample must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ProgressMonitor {
    config: MonitorConfig,
    num_validation_samples: usize,
    log: ProgressLog,
    rng: ChaCha8Rng,
}

impl ProgressMonitor {
    /// Fails when there is nothing to normalize the diagnostics by.
    pub fn new(config: MonitorConfig, num_validation_samples: usize, seed: u64) -> Result<Self> {
        config.validate()?;
        if num_validation_samples == 0 {
            return Err(FitError::NoValidationSamples);
        }
        Ok(Self {
            config,
            num_validation_samples,
            log: ProgressLog::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    pub fn for_batch<B: Batch + ?Sized>(config: MonitorConfig, batch: &B, seed: u64) -> Result<Self> {
        Self::new(config, batch.num_validation_samples(), seed)
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn log(&self) -> &ProgressLog {
        &self.log
    }

    /// Raw sum of squared differences between `data` and a single chain
    /// step started from it.
    pub fn reconstruction_error<M: EnergyModel + ?Sized>(
        &mut self,
        model: &M,
        data: &Array2<f32>,
    ) -> Result<f64> {
        let mut sampler = ChainSampler::new(data.clone(), UpdateMethod::Stochastic, self.rng.gen());
        sampler.update_state(model, 1)?;
        Ok(numeric::squared_error_sum(data, &sampler.get_state(model)?))
    }

    /// Energy distance between `data` and relaxed model samples, scaled by
    /// the number of samples so that it can be summed across mini-batches.
    pub fn energy_distance<M: EnergyModel + ?Sized>(
        &mut self,
        model: &M,
        data: &Array2<f32>,
    ) -> Result<f64> {
        let fantasy = model.random(data, &mut self.rng);
        let n = fantasy.nrows();
        let mut sampler = ChainSampler::new(fantasy, UpdateMethod::Stochastic, self.rng.gen());
        sampler.update_state(model, self.config.update_steps)?;
        let evolved = sampler.get_state(model)?;
        let d = numeric::energy_distance(data, &evolved, self.config.downsample, &mut self.rng);
        Ok(n as f64 * d)
    }

    /// Run `checkpoint` when `t` is a multiple of `skip`; otherwise do
    /// nothing and return `None`.
    pub fn check_progress<M, B>(
        &mut self,
        model: &M,
        batch: &mut B,
        t: usize,
        store: bool,
    ) -> Result<Option<Progress>>
    where
        M: EnergyModel + ?Sized,
        B: Batch + ?Sized,
    {
        if t % self.config.skip != 0 {
            return Ok(None);
        }
        self.checkpoint(model, batch, store).map(Some)
    }

    /// Score the model over the whole validation partition.
    pub fn checkpoint<M, B>(&mut self, model: &M, batch: &mut B, store: bool) -> Result<Progress>
    where
        M: EnergyModel + ?Sized,
        B: Batch + ?Sized,
    {
        let mut recon = 0.0f64;
        let mut edist = 0.0f64;
        let mut batches = 0usize;
        while let Some(data) = batch.get(Mode::Validate) {
            recon += self.reconstruction_error(model, &data)?;
            edist += self.energy_distance(model, &data)?;
            batches += 1;
        }
        if batches == 0 {
            tracing::warn!("validation partition yielded no mini-batches");
        }

        let n = self.num_validation_samples as f64;
        let progress = Progress {
            reconstruction_error: (recon / n).sqrt(),
            energy_distance: edist / n,
        };
        if store {
            self.log.push(progress);
        }
        Ok(progress)
    }
}
