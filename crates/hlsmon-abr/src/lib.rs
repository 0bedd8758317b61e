#![forbid(unsafe_code)]

mod estimator;
mod selector;
mod types;

pub use crate::{
    estimator::ThroughputEstimator,
    selector::{RenditionSelector, SwitchDecision, SwitchReason},
    types::{AbrOptions, ThroughputSample, Variant},
};
