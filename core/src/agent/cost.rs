use crate::agent::UsageTally;
use serde::{Deserialize, Serialize};

/// USD per million tokens for gpt-4o-mini.
pub const DEFAULT_INPUT_PER_MILLION: f64 = 0.150;
pub const DEFAULT_OUTPUT_PER_MILLION: f64 = 0.600;

/// USD per million tokens for Claude Sonnet on Bedrock.
pub const BEDROCK_INPUT_PER_MILLION: f64 = 3.00;
pub const BEDROCK_OUTPUT_PER_MILLION: f64 = 15.00;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostTracker {
    input_per_million: f64,
    output_per_million: f64,
}

impl Default for CostTracker {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_PER_MILLION, DEFAULT_OUTPUT_PER_MILLION)
    }
}

impl CostTracker {
    pub fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    pub fn estimate_cost(&self, usage: &UsageTally) -> CostEstimate {
        let input_cost = usage.prompt_tokens as f64 / 1_000_000.0 * self.input_per_million;
        let output_cost = usage.completion_tokens as f64 / 1_000_000.0 * self.output_per_million;
        CostEstimate {
            input_cost,
            output_cost,
            total_cost: input_cost + output_cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn applies_default_rates() {
        let estimate = CostTracker::default().estimate_cost(&UsageTally::new(1_000_000, 500_000));
        assert!(close(estimate.input_cost, 0.15));
        assert!(close(estimate.output_cost, 0.30));
        assert!(close(estimate.total_cost, 0.45));
    }

    #[test]
    fn empty_tally_costs_nothing() {
        let estimate = CostTracker::new(3.0, 15.0).estimate_cost(&UsageTally::default());
        assert_eq!(estimate.total_cost, 0.0);
    }
}
