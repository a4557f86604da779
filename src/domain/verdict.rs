//! Verdict: the tri-state outcome of a property check.

use async_graphql::{Enum, SimpleObject};
use serde::{Deserialize, Serialize};

/// Health judgment for one node in one poll cycle.
///
/// `Indeterminate` covers every case where no judgment is possible: the node
/// has no channel, the check has no range expression, or the range
/// expression failed to evaluate. It never drives a connectivity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Enum)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Healthy,
    Unhealthy,
    Indeterminate,
}

impl Verdict {
    /// Map a successful range-expression result to a verdict.
    ///
    /// Only the exact canonical rendering of boolean `true` counts as healthy.
    pub fn from_range_output(output: &str) -> Self {
        if output == true.to_string() {
            Self::Healthy
        } else {
            Self::Unhealthy
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Unhealthy => write!(f, "unhealthy"),
            Self::Indeterminate => write!(f, "indeterminate"),
        }
    }
}

/// Result of evaluating one check against one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
pub struct EvaluationResult {
    pub verdict: Verdict,
    pub value: Option<String>,
    pub detail: Option<String>,
}

impl EvaluationResult {
    pub fn indeterminate() -> Self {
        Self {
            verdict: Verdict::Indeterminate,
            value: None,
            detail: None,
        }
    }
}
