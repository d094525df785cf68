//! Fraud Rule Generator
//!
//! Turns a trained model's false-positive-rate/threshold table into an ordered
//! set of detector rules, one per FPR band, each yielding an outcome.

mod outcome;
mod rules;
mod table;

pub use outcome::Outcome;
pub use rules::{GeneratedRule, RuleGenerator, RuleGeneratorConfig};
pub use table::{reduce_bands, round2, FprBand, MetricDataPoint};

use thiserror::Error;

/// Errors during rule generation
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Model id must not be empty")]
    EmptyModelId,
}
