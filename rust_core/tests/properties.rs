//! Property-based tests for the samplers and numeric kernels using proptest.

use ebmfit_core::model::{Beta, EnergyModel};
use ebmfit_core::numeric::{self, BoundaryPolicy};
use ebmfit_core::sampler::{Sampler, TemperedSampler, TemperingConfig, UpdateMethod};
use ndarray::{Array, Array1, Array2, Axis};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Random-walk model: each step adds beta-scaled Gaussian-ish jitter drawn
/// from the caller's RNG. Free energy is the beta-weighted squared norm.
struct Jitter;

impl EnergyModel for Jitter {
    fn markov_chain(
        &self,
        state: &Array2<f32>,
        steps: usize,
        beta: Beta<'_>,
        rng: &mut ChaCha8Rng,
    ) -> Array2<f32> {
        use rand::Rng;
        let mut next = state.clone();
        for _ in 0..steps {
            for (i, mut row) in next.rows_mut().into_iter().enumerate() {
                let b = beta.get(i);
                row.mapv_inplace(|v| v + b * rng.gen_range(-1.0f32..1.0));
            }
        }
        next
    }

    fn mean_field_iteration(&self, s: &Array2<f32>, _: usize, _: Beta<'_>) -> Array2<f32> {
        s.clone()
    }

    fn deterministic_iteration(&self, s: &Array2<f32>, _: usize, _: Beta<'_>) -> Array2<f32> {
        s.clone()
    }

    fn marginal_free_energy(&self, s: &Array2<f32>, beta: Beta<'_>) -> Array1<f32> {
        let norms = s.map_axis(Axis(1), |r| r.dot(&r));
        Array1::from_shape_fn(norms.len(), |i| beta.get(i) * norms[i])
    }

    fn random(&self, like: &Array2<f32>, _: &mut ChaCha8Rng) -> Array2<f32> {
        Array2::zeros(like.raw_dim())
    }
}

fn ensemble(n: usize, dim: usize, offset: f32) -> Array2<f32> {
    Array::from_shape_fn((n, dim), |(i, j)| offset + (i * dim + j) as f32 * 0.1)
}

fn boundary() -> impl Strategy<Value = BoundaryPolicy> {
    prop_oneof![Just(BoundaryPolicy::Clamp), Just(BoundaryPolicy::Reflect)]
}

proptest! {
    #[test]
    fn resample_returns_n_rows_from_input(
        n in 1usize..40,
        dim in 1usize..6,
        seed in any::<u64>(),
    ) {
        let init = ensemble(n, dim, -1.0);
        let mut sampler = TemperedSampler::new(init, UpdateMethod::Stochastic, seed);
        sampler.update_state(&Jitter, 2).unwrap();
        let before = sampler.state().to_owned();
        let out = sampler.get_state(&Jitter).unwrap();

        prop_assert_eq!(out.nrows(), n);
        for row in out.rows() {
            prop_assert!(before.rows().into_iter().any(|r| r == row));
        }
    }

    #[test]
    fn importance_weights_sum_to_one(
        deltas in prop::collection::vec(-1.0e4f32..1.0e4, 1..64),
    ) {
        let w = numeric::exp_normalize(Array1::from(deltas).view()).unwrap();
        prop_assert!((w.sum() - 1.0).abs() < 1e-9);
        prop_assert!(w.iter().all(|&x| x >= 0.0));
    }

    #[test]
    fn beta_stays_in_unit_interval(
        beta_step in 0.0f32..2.0,
        updates in 1usize..60,
        policy in boundary(),
        seed in any::<u64>(),
    ) {
        let tempering = TemperingConfig { beta_step, boundary: policy };
        let mut sampler = TemperedSampler::with_tempering(
            ensemble(8, 2, 0.0),
            UpdateMethod::Stochastic,
            seed,
            tempering,
        )
        .unwrap();
        for _ in 0..updates {
            sampler.update_state(&Jitter, 1).unwrap();
            prop_assert!(sampler.beta().iter().all(|&b| (0.0..=1.0).contains(&b)));
        }
    }

    #[test]
    fn boundary_policy_maps_into_unit_interval(x in any::<f32>(), policy in boundary()) {
        let y = policy.apply(x);
        prop_assert!((0.0..=1.0).contains(&y));
    }

    #[test]
    fn diagnostics_are_non_negative(
        n in 1usize..30,
        m in 1usize..30,
        offset in -5.0f32..5.0,
        downsample in 1usize..20,
        seed in any::<u64>(),
    ) {
        let x = ensemble(n, 3, 0.0);
        let y = ensemble(m, 3, offset);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        prop_assert!(numeric::energy_distance(&x, &y, downsample, &mut rng) >= 0.0);

        let y_same = ensemble(n, 3, offset);
        prop_assert!(numeric::squared_error_sum(&x, &y_same) >= 0.0);
    }
}

#[test]
fn same_seed_same_resample() {
    let run = |seed| {
        let mut s = TemperedSampler::new(ensemble(16, 3, 0.5), UpdateMethod::Stochastic, seed);
        for _ in 0..5 {
            s.update_state(&Jitter, 1).unwrap();
        }
        (s.beta().to_owned(), s.get_state(&Jitter).unwrap())
    };
    assert_eq!(run(9), run(9));
}
