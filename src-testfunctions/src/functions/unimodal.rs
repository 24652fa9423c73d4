//! Single-optimum functions.

use ndarray::Array1;

/// N-dimensional quadratic bowl. Global minimum `f(0) = 0`.
pub fn sphere(x: &Array1<f64>) -> f64 {
    x.iter().map(|v| v * v).sum()
}

/// Rosenbrock's banana function. Global minimum `f(1,...,1) = 0`.
pub fn rosenbrock(x: &Array1<f64>) -> f64 {
    x.windows(2)
        .into_iter()
        .map(|w| {
            let (a, b) = (w[0], w[1]);
            100.0 * (b - a * a).powi(2) + (1.0 - a).powi(2)
        })
        .sum()
}
