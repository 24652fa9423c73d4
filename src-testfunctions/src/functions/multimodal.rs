//! Multi-optimum functions — many local minima, used to stress-test the
//! acquisition optimizer's local+random search.

use ndarray::Array1;
use std::f64::consts::PI;

/// N-dimensional highly multimodal function. Global minimum `f(0) = 0`.
pub fn rastrigin(x: &Array1<f64>) -> f64 {
    let n = x.len() as f64;
    10.0 * n + x.iter().map(|v| v * v - 10.0 * (2.0 * PI * v).cos()).sum::<f64>()
}

/// N-dimensional multimodal function. Global minimum `f(0) = 0`.
pub fn ackley(x: &Array1<f64>) -> f64 {
    let n = x.len() as f64;
    let sum_sq: f64 = x.iter().map(|v| v * v).sum();
    let sum_cos: f64 = x.iter().map(|v| (2.0 * PI * v).cos()).sum();
    -20.0 * (-0.2 * (sum_sq / n).sqrt()).exp() - (sum_cos / n).exp() + 20.0 + std::f64::consts::E
}

/// 2D Branin function with three global minima, each `f ≈ 0.397887`.
pub fn branin(x: &Array1<f64>) -> f64 {
    let (x1, x2) = (x[0], x[1]);
    let a = 1.0;
    let b = 5.1 / (4.0 * PI * PI);
    let c = 5.0 / PI;
    let r = 6.0;
    let s = 10.0;
    let t = 1.0 / (8.0 * PI);
    a * (x2 - b * x1 * x1 + c * x1 - r).powi(2) + s * (1.0 - t) * x1.cos() + s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rastrigin_is_zero_at_origin() {
        let x = Array1::from_vec(vec![0.0, 0.0]);
        assert!((rastrigin(&x) - 0.0).abs() < 1e-10);
    }

    #[test]
    fn ackley_is_zero_at_origin() {
        let x = Array1::from_vec(vec![0.0, 0.0]);
        assert!((ackley(&x) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn branin_matches_known_minimum() {
        let x = Array1::from_vec(vec![PI, 2.275]);
        assert!((branin(&x) - 0.397887).abs() < 1e-4);
    }
}
