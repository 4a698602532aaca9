use std::fmt;

use serde::{Deserialize, Serialize};

pub const BUDGET_MIN: u32 = 500;
pub const BUDGET_MAX: u32 = 50_000;
pub const BUDGET_DEFAULT: u32 = 5_000;

/// Coarse budget classification sent to the generation service in place of
/// the raw figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetLevel {
    Low,
    Medium,
    High,
}

impl BudgetLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            BudgetLevel::Low => "low",
            BudgetLevel::Medium => "medium",
            BudgetLevel::High => "high",
        }
    }
}

impl fmt::Display for BudgetLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive upper bounds of the `low` and `medium` tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetThresholds {
    pub low_max: u32,
    pub medium_max: u32,
}

impl Default for BudgetThresholds {
    fn default() -> Self {
        Self {
            low_max: 10_000,
            medium_max: 20_000,
        }
    }
}

impl BudgetThresholds {
    pub fn new(low_max: u32, medium_max: u32) -> Option<Self> {
        (low_max < medium_max).then_some(Self {
            low_max,
            medium_max,
        })
    }

    pub fn level(&self, budget: u32) -> BudgetLevel {
        if budget <= self.low_max {
            BudgetLevel::Low
        } else if budget <= self.medium_max {
            BudgetLevel::Medium
        } else {
            BudgetLevel::High
        }
    }
}

pub fn clamp_budget(raw: i64) -> u32 {
    raw.clamp(i64::from(BUDGET_MIN), i64::from(BUDGET_MAX)) as u32
}
