//! Test function implementations, grouped by landscape shape.

pub mod multimodal;
pub mod unimodal;

pub use multimodal::*;
pub use unimodal::*;
