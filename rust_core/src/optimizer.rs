use ndarray::Array2;

/// Parameter-update rule driven by the training loop.
///
/// The gradient estimate is formed from a positive phase (`data`) and a
/// negative phase (`model_sample`); how it is turned into a parameter step,
/// and when training counts as converged, is up to the implementation.
pub trait Optimizer<M: ?Sized> {
    fn update(&mut self, model: &mut M, data: &Array2<f32>, model_sample: &Array2<f32>, epoch: usize);

    /// Checked once per epoch; `true` stops training.
    fn check_convergence(&self) -> bool;
}
