//! Position sampling.
//!
//! ## Contents
//! - [`Locator`] / [`Fix`] the injected location capability
//! - [`PositionSampler`] / [`SampleStream`] cadence, timeout, validation

mod locator;
#[allow(clippy::module_inception)]
mod sampler;

pub use locator::{Fix, Locator};
pub use sampler::{PositionSampler, SampleStream, SamplerParams};
