//! Synthetic multi-fidelity objective functions for driving the optimizer
//! core's demo worker harness and integration tests. Each pure test
//! function is wrapped by [`fidelity::SyntheticFidelity`] into a
//! `(x, budget) -> loss` objective whose bias and noise shrink to zero at
//! full fidelity.

pub mod fidelity;
pub mod functions;

pub use fidelity::{
    ackley_multi_fidelity, branin_multi_fidelity, rastrigin_multi_fidelity, rosenbrock_multi_fidelity,
    sphere_multi_fidelity, MultiFidelityObjective, SyntheticFidelity,
};
pub use functions::*;
