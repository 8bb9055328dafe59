use ndarray::{Array1, Array2, ArrayView1};
use rand_chacha::ChaCha8Rng;

/// Inverse temperature handed to the model operators.
///
/// `Full` evaluates the untempered model (beta = 1 for every particle);
/// `Tempered` carries one value in [0, 1] per particle row.
#[derive(Debug, Clone, Copy)]
pub enum Beta<'a> {
    Full,
    Tempered(ArrayView1<'a, f32>),
}

impl Beta<'_> {
    /// Temperature of particle `i`.
    pub fn get(&self, i: usize) -> f32 {
        match self {
            Beta::Full => 1.0,
            Beta::Tempered(b) => b[i],
        }
    }
}

/// Capabilities a trainable energy-based model exposes to the samplers.
///
/// Every operator takes the whole particle ensemble (one row per particle)
/// and returns a new ensemble with the same number of rows. Stochastic
/// operators draw from the caller's RNG so runs stay reproducible.
pub trait EnergyModel {
    /// `steps` stochastic transitions (e.g. block Gibbs sweeps).
    fn markov_chain(
        &self,
        state: &Array2<f32>,
        steps: usize,
        beta: Beta<'_>,
        rng: &mut ChaCha8Rng,
    ) -> Array2<f32>;

    /// `steps` rounds of mean-field (expectation) propagation.
    fn mean_field_iteration(&self, state: &Array2<f32>, steps: usize, beta: Beta<'_>)
        -> Array2<f32>;

    /// `steps` rounds of deterministic fixed-point iteration.
    fn deterministic_iteration(
        &self,
        state: &Array2<f32>,
        steps: usize,
        beta: Beta<'_>,
    ) -> Array2<f32>;

    /// Free energy of each particle with the hidden units marginalized out.
    fn marginal_free_energy(&self, state: &Array2<f32>, beta: Beta<'_>) -> Array1<f32>;

    /// Unconditional sample with the same shape as `like`.
    fn random(&self, like: &Array2<f32>, rng: &mut ChaCha8Rng) -> Array2<f32>;
}
