//! Configuration Space.
//!
//! A configuration is an opaque structured value with structural equality
//! and a canonical dense numeric encoding. The space itself only knows how
//! to sample, encode, and describe its dimensions; it has no notion of
//! budgets, jobs, or regressors.

use std::collections::HashSet;

use ndarray::Array1;
use rand::Rng;

use crate::error::CoreError;

/// The kind of a single dimension of the search space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Float,
    Int,
    /// Unordered categorical with `n` levels, encoded as `0..n`.
    Categorical(usize),
}

/// One dimension: name, kind, and inclusive numeric bounds (for
/// `Categorical(n)`, bounds are `[0, n-1]`).
#[derive(Debug, Clone)]
pub struct Dimension {
    pub name: String,
    pub kind: VarType,
    pub low: f64,
    pub high: f64,
}

impl Dimension {
    pub fn float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self { name: name.into(), kind: VarType::Float, low, high }
    }

    pub fn int(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self { name: name.into(), kind: VarType::Int, low: low as f64, high: high as f64 }
    }

    pub fn categorical(name: impl Into<String>, n_levels: usize) -> Self {
        assert!(n_levels > 0, "categorical dimension needs at least one level");
        Self {
            name: name.into(),
            kind: VarType::Categorical(n_levels),
            low: 0.0,
            high: (n_levels - 1) as f64,
        }
    }
}

/// A single sampled value, one per `Dimension`.
#[derive(Debug, Clone, Copy)]
pub enum Value {
    Float(f64),
    Int(i64),
    Categorical(u32),
}

impl Value {
    fn key_bits(&self) -> u64 {
        match *self {
            Value::Float(v) => v.to_bits(),
            Value::Int(v) => v as u64,
            Value::Categorical(v) => v as u64,
        }
    }

    fn as_f64(&self) -> f64 {
        match *self {
            Value::Float(v) => v,
            Value::Int(v) => v as f64,
            Value::Categorical(v) => v as f64,
        }
    }
}

/// An opaque structured configuration. Equality is structural over the
/// per-dimension values (bit-exact on floats), so membership tests against
/// a rung's config set stay deterministic — no epsilon fuzzing.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub(crate) values: Vec<Value>,
}

impl Configuration {
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get_f64(&self, idx: usize) -> f64 {
        self.values[idx].as_f64()
    }
}

impl PartialEq for Configuration {
    fn eq(&self, other: &Self) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(other.values.iter())
                .all(|(a, b)| a.key_bits() == b.key_bits())
    }
}
impl Eq for Configuration {}

impl std::hash::Hash for Configuration {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for v in &self.values {
            v.key_bits().hash(state);
        }
    }
}

/// Bounded retry count before `sample` gives up.
const MAX_SAMPLE_ATTEMPTS: usize = 200;

/// The search domain: an ordered list of dimensions.
#[derive(Debug, Clone)]
pub struct ConfigurationSpace {
    dims: Vec<Dimension>,
}

impl ConfigurationSpace {
    pub fn new(dims: Vec<Dimension>) -> Self {
        assert!(!dims.is_empty(), "configuration space needs at least one dimension");
        Self { dims }
    }

    pub fn dims(&self) -> &[Dimension] {
        &self.dims
    }

    pub fn dim(&self) -> usize {
        self.dims.len()
    }

    /// Uniform random sample, rejecting anything already in `excluded`.
    /// Degrades to `ExhaustedSampling` after `MAX_SAMPLE_ATTEMPTS` retries
    ///; the caller decides whether to fall back to a
    /// duplicate.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        excluded: &HashSet<Configuration>,
    ) -> Result<Configuration, CoreError> {
        for _ in 0..MAX_SAMPLE_ATTEMPTS {
            let cfg = self.sample_unchecked(rng);
            if !excluded.contains(&cfg) {
                return Ok(cfg);
            }
        }
        Err(CoreError::ExhaustedSampling { attempts: MAX_SAMPLE_ATTEMPTS })
    }

    /// Sample a single configuration without checking exclusions.
    pub fn sample_unchecked<R: Rng + ?Sized>(&self, rng: &mut R) -> Configuration {
        let values = self
            .dims
            .iter()
            .map(|d| match d.kind {
                VarType::Float => Value::Float(rng.random_range(d.low..=d.high)),
                VarType::Int => {
                    let lo = d.low.round() as i64;
                    let hi = d.high.round() as i64;
                    Value::Int(rng.random_range(lo..=hi))
                }
                VarType::Categorical(n) => Value::Categorical(rng.random_range(0..n as u32)),
            })
            .collect();
        Configuration { values }
    }

    /// Deterministic dense numeric encoding, `vec(x) in R^d`.
    pub fn encode(&self, cfg: &Configuration) -> Array1<f64> {
        Array1::from(cfg.values.iter().map(Value::as_f64).collect::<Vec<_>>())
    }

    /// Metadata for regressors that use per-dimension type/bounds info.
    pub fn types_and_bounds(&self) -> (Vec<VarType>, Vec<(f64, f64)>) {
        let types = self.dims.iter().map(|d| d.kind).collect();
        let bounds = self.dims.iter().map(|d| (d.low, d.high)).collect();
        (types, bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn toy_space() -> ConfigurationSpace {
        ConfigurationSpace::new(vec![
            Dimension::float("lr", 1e-4, 1.0),
            Dimension::int("depth", 1, 10),
            Dimension::categorical("kernel", 3),
        ])
    }

    #[test]
    fn sample_respects_bounds() {
        let space = toy_space();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let cfg = space.sample_unchecked(&mut rng);
            assert!(cfg.get_f64(0) >= 1e-4 && cfg.get_f64(0) <= 1.0);
            assert!(cfg.get_f64(1) >= 1.0 && cfg.get_f64(1) <= 10.0);
            assert!(cfg.get_f64(2) >= 0.0 && cfg.get_f64(2) <= 2.0);
        }
    }

    #[test]
    fn encode_is_deterministic() {
        let space = toy_space();
        let cfg = Configuration {
            values: vec![Value::Float(0.5), Value::Int(3), Value::Categorical(1)],
        };
        let e1 = space.encode(&cfg);
        let e2 = space.encode(&cfg);
        assert_eq!(e1, e2);
        assert_eq!(e1.as_slice().unwrap(), &[0.5, 3.0, 1.0]);
    }

    #[test]
    fn equality_is_structural() {
        let a = Configuration { values: vec![Value::Float(1.0), Value::Int(2)] };
        let b = Configuration { values: vec![Value::Float(1.0), Value::Int(2)] };
        let c = Configuration { values: vec![Value::Float(1.0), Value::Int(3)] };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn sample_excludes_until_exhausted() {
        // A single-point space (low == high): every sample is identical, so
        // excluding that one point must exhaust retries.
        let space = ConfigurationSpace::new(vec![Dimension::float("x", 1.0, 1.0)]);
        let mut rng = StdRng::seed_from_u64(1);
        let only = space.sample_unchecked(&mut rng);
        let mut excluded = HashSet::new();
        excluded.insert(only);
        let result = space.sample(&mut rng, &excluded);
        assert!(matches!(result, Err(CoreError::ExhaustedSampling { .. })));
    }
}
