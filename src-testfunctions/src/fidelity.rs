//! Wraps a plain objective function into a multi-fidelity one: evaluating
//! at a lower budget adds a bias and noise term that both shrink toward
//! zero as `budget -> max_budget`, so the full-fidelity evaluation recovers
//! the true function while low-fidelity evaluations are a cheap, noisy
//! stand-in — the textbook shape of a multi-fidelity benchmark.

use ndarray::Array1;
use rand::RngCore;
use rand_distr::{Distribution, Normal};

use crate::functions::{ackley, branin, rastrigin, rosenbrock, sphere};

/// Anything workers in a demo harness can call to get a `(config, budget)`
/// loss. Object-safe so a trait object can stand in for "the objective".
pub trait MultiFidelityObjective: Send + Sync {
    fn dim(&self) -> usize;
    fn bounds(&self) -> Vec<(f64, f64)>;
    fn evaluate(&self, x: &[f64], budget: u64, max_budget: u64, rng: &mut dyn RngCore) -> f64;
}

/// Adapts a pure function into a multi-fidelity objective via a
/// budget-decaying additive bias and Gaussian noise.
pub struct SyntheticFidelity {
    base: fn(&Array1<f64>) -> f64,
    bounds: Vec<(f64, f64)>,
    bias_scale: f64,
    noise_scale: f64,
}

impl SyntheticFidelity {
    pub fn new(base: fn(&Array1<f64>) -> f64, bounds: Vec<(f64, f64)>, bias_scale: f64, noise_scale: f64) -> Self {
        Self { base, bounds, bias_scale, noise_scale }
    }
}

impl MultiFidelityObjective for SyntheticFidelity {
    fn dim(&self) -> usize {
        self.bounds.len()
    }

    fn bounds(&self) -> Vec<(f64, f64)> {
        self.bounds.clone()
    }

    fn evaluate(&self, x: &[f64], budget: u64, max_budget: u64, rng: &mut dyn RngCore) -> f64 {
        let x = Array1::from(x.to_vec());
        let true_value = (self.base)(&x);
        let decay = 1.0 - (budget as f64 / max_budget as f64).clamp(0.0, 1.0);
        let bias = self.bias_scale * decay;
        let sigma = (self.noise_scale * decay).max(0.0);
        let noise = if sigma > 1e-12 {
            Normal::new(0.0, sigma).unwrap().sample(&mut RngCoreAdapter(rng))
        } else {
            0.0
        };
        true_value + bias + noise
    }
}

/// `rand_distr`'s `Distribution::sample` wants a concrete `Rng`; this
/// blanket-forwards through a `&mut dyn RngCore` trait object.
struct RngCoreAdapter<'a>(&'a mut dyn RngCore);
impl rand::RngCore for RngCoreAdapter<'_> {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }
    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }
}

pub fn sphere_multi_fidelity(dim: usize) -> SyntheticFidelity {
    SyntheticFidelity::new(sphere, vec![(-5.0, 5.0); dim], 2.0, 1.0)
}

pub fn rosenbrock_multi_fidelity(dim: usize) -> SyntheticFidelity {
    SyntheticFidelity::new(rosenbrock, vec![(-2.048, 2.048); dim], 5.0, 2.0)
}

pub fn rastrigin_multi_fidelity(dim: usize) -> SyntheticFidelity {
    SyntheticFidelity::new(rastrigin, vec![(-5.12, 5.12); dim], 5.0, 2.0)
}

pub fn ackley_multi_fidelity(dim: usize) -> SyntheticFidelity {
    SyntheticFidelity::new(ackley, vec![(-32.768, 32.768); dim], 3.0, 1.5)
}

pub fn branin_multi_fidelity() -> SyntheticFidelity {
    SyntheticFidelity::new(branin, vec![(-5.0, 10.0), (0.0, 15.0)], 2.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn full_fidelity_has_no_bias_or_noise() {
        let obj = sphere_multi_fidelity(2);
        let mut rng = StdRng::seed_from_u64(0);
        let loss = obj.evaluate(&[0.0, 0.0], 9, 9, &mut rng);
        assert_eq!(loss, 0.0);
    }

    #[test]
    fn low_fidelity_adds_bias() {
        let obj = sphere_multi_fidelity(2);
        let mut rng = StdRng::seed_from_u64(0);
        let loss = obj.evaluate(&[0.0, 0.0], 1, 9, &mut rng);
        assert!(loss.abs() > 0.0);
    }
}
