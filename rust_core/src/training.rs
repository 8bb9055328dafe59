//! Contrastive-divergence training loops.
//!
//!   - CD-k (Hinton 2002): every mini-batch restarts a fresh chain from the
//!     data and runs it for k steps.
//!   - PCD-k (Tieleman 2008): one tempered chain lives for the whole run and
//!     advances k steps per mini-batch.
//!
//! Both share the same epoch loop; only the `ResetPolicy` differs.

use crate::batch::{Batch, Mode};
use crate::error::Result;
use crate::model::EnergyModel;
use crate::monitor::{MonitorConfig, ProgressMonitor};
use crate::optimizer::Optimizer;
use crate::progress::{fmt_elapsed, Progress, ProgressLog};
use crate::sampler::{ChainSampler, Sampler, TemperedSampler, TemperingConfig, UpdateMethod};
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// What happens to the negative-phase chain between mini-batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// Contrastive divergence: a new chain from every data mini-batch.
    ResetEachMinibatch,
    /// Persistent contrastive divergence: one chain carried across
    /// mini-batches and epochs.
    Persist,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    /// MCMC steps per mini-batch (the k in CD-k).
    pub mcsteps: usize,
    pub update_method: UpdateMethod,
    /// Root seed; every sampler and the monitor get seeds derived from it.
    pub seed: u64,
    pub tempering: TemperingConfig,
    pub monitor: MonitorConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            mcsteps: 1,
            update_method: UpdateMethod::Stochastic,
            seed: 42,
            tempering: TemperingConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        self.tempering.validate()?;
        self.monitor.validate()
    }
}

/// Outcome of `Trainer::train`.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub epochs_run: usize,
    pub updates: usize,
    pub converged: bool,
    pub last_progress: Option<Progress>,
}

pub struct Trainer<M, B, O> {
    model: M,
    batch: B,
    optimizer: O,
    config: TrainingConfig,
    policy: ResetPolicy,
    sampler: TemperedSampler,
    monitor: ProgressMonitor,
    rng: ChaCha8Rng,
}

impl<M, B, O> Trainer<M, B, O>
where
    M: EnergyModel,
    B: Batch,
    O: Optimizer<M>,
{
    /// Seeds the persistent sampler from the first training mini-batch and
    /// leaves `batch` re-armed for full passes.
    pub fn new(
        model: M,
        mut batch: B,
        optimizer: O,
        config: TrainingConfig,
        policy: ResetPolicy,
    ) -> Result<Self> {
        config.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let sampler = TemperedSampler::from_batch(
            &mut batch,
            config.update_method,
            rng.gen(),
            config.tempering.clone(),
        )?;
        let monitor = ProgressMonitor::for_batch(config.monitor.clone(), &batch, rng.gen())?;
        Ok(Self {
            model,
            batch,
            optimizer,
            config,
            policy,
            sampler,
            monitor,
            rng,
        })
    }

    pub fn contrastive_divergence(model: M, batch: B, optimizer: O, config: TrainingConfig) -> Result<Self> {
        Self::new(model, batch, optimizer, config, ResetPolicy::ResetEachMinibatch)
    }

    pub fn persistent_contrastive_divergence(
        model: M,
        batch: B,
        optimizer: O,
        config: TrainingConfig,
    ) -> Result<Self> {
        Self::new(model, batch, optimizer, config, ResetPolicy::Persist)
    }

    /// Run up to `epochs` passes over the training partition, scoring the
    /// model after each one and stopping early once the optimizer reports
    /// convergence.
    pub fn train(&mut self) -> Result<TrainingReport> {
        tracing::info!(
            epochs = self.config.epochs,
            mcsteps = self.config.mcsteps,
            policy = ?self.policy,
            method = %self.config.update_method,
            "training started"
        );

        let mut report = TrainingReport {
            epochs_run: 0,
            updates: 0,
            converged: false,
            last_progress: None,
        };

        for epoch in 0..self.config.epochs {
            let start = Instant::now();
            let mut t = 0usize;

            while let Some(v_data) = self.batch.get(Mode::Train) {
                let v_model = self.negative_phase(&v_data)?;
                self.optimizer.update(&mut self.model, &v_data, &v_model, epoch);
                tracing::debug!(epoch, t, "parameters updated");
                t += 1;
            }

            let progress = self.monitor.checkpoint(&self.model, &mut self.batch, true)?;
            tracing::info!(
                epoch,
                updates = t,
                reconstruction_error = progress.reconstruction_error,
                energy_distance = progress.energy_distance,
                elapsed = %fmt_elapsed(start.elapsed()),
                "end of epoch"
            );

            report.epochs_run += 1;
            report.updates += t;
            report.last_progress = Some(progress);

            if self.optimizer.check_convergence() {
                tracing::info!(epoch, "convergence criterion reached");
                report.converged = true;
                break;
            }
        }

        Ok(report)
    }

    fn negative_phase(&mut self, v_data: &Array2<f32>) -> Result<Array2<f32>> {
        let steps = self.config.mcsteps;
        match self.policy {
            ResetPolicy::ResetEachMinibatch => {
                let mut chain =
                    ChainSampler::new(v_data.clone(), self.config.update_method, self.rng.gen());
                chain.update_state(&self.model, steps)?;
                chain.get_state(&self.model)
            }
            ResetPolicy::Persist => {
                self.sampler.update_state(&self.model, steps)?;
                self.sampler.get_state(&self.model)
            }
        }
    }

    pub fn policy(&self) -> ResetPolicy {
        self.policy
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    /// The long-lived tempered sampler (advanced only under `Persist`).
    pub fn sampler(&self) -> &TemperedSampler {
        &self.sampler
    }

    pub fn monitor(&self) -> &ProgressMonitor {
        &self.monitor
    }

    pub fn progress_log(&self) -> &ProgressLog {
        self.monitor.log()
    }

    pub fn into_parts(self) -> (M, B, O) {
        (self.model, self.batch, self.optimizer)
    }
}
