//! Detector outcomes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome a rule yields when its expression matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Approve,
    VerifyCustomer,
    Review,
}

impl Outcome {
    /// Every outcome a detector needs before rules can reference it
    pub const ALL: [Outcome; 3] = [Outcome::VerifyCustomer, Outcome::Review, Outcome::Approve];

    /// Name registered with the rules engine
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Approve => "approve",
            Outcome::VerifyCustomer => "verify_customer",
            Outcome::Review => "review",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Outcome::Approve => "this outcome approves the event",
            Outcome::VerifyCustomer => "this outcome initiates a verification workflow",
            Outcome::Review => "this outcome sidelines event for human or automated review",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
