//! Ordinal risk levels and the threshold ladder that produces them.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Three ascending thresholds: above `medium` is medium, above `high` is
/// high, above `critical` is critical.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoints {
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Breakpoints {
    pub const fn new(medium: f64, high: f64, critical: f64) -> Self {
        Self {
            medium,
            high,
            critical,
        }
    }
}

/// Charger failure probability.
pub const FAILURE_BREAKPOINTS: Breakpoints = Breakpoints::new(0.4, 0.6, 0.8);

/// Inventory stockout probability.
pub const STOCKOUT_BREAKPOINTS: Breakpoints = Breakpoints::new(0.4, 0.6, 0.8);

/// Combined anomaly/compliance risk of an audited decision.
pub const AUDIT_BREAKPOINTS: Breakpoints = Breakpoints::new(0.4, 0.6, 0.8);

/// Maps `score` onto the ladder. Comparisons are strict, so a score equal to
/// a breakpoint stays on the lower rung.
pub fn classify(score: f64, breakpoints: &Breakpoints) -> RiskLevel {
    if score > breakpoints.critical {
        RiskLevel::Critical
    } else if score > breakpoints.high {
        RiskLevel::High
    } else if score > breakpoints.medium {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder() {
        assert_eq!(classify(0.39, &FAILURE_BREAKPOINTS), RiskLevel::Low);
        assert_eq!(classify(0.41, &FAILURE_BREAKPOINTS), RiskLevel::Medium);
        assert_eq!(classify(0.61, &FAILURE_BREAKPOINTS), RiskLevel::High);
        assert_eq!(classify(0.81, &FAILURE_BREAKPOINTS), RiskLevel::Critical);
    }

    #[test]
    fn test_boundaries_are_strict() {
        assert_eq!(classify(0.4, &FAILURE_BREAKPOINTS), RiskLevel::Low);
        assert_eq!(classify(0.6, &FAILURE_BREAKPOINTS), RiskLevel::Medium);
        assert_eq!(classify(0.8, &FAILURE_BREAKPOINTS), RiskLevel::High);
    }

    #[test]
    fn test_monotonic() {
        let mut previous = RiskLevel::Low;
        for step in 0..=100 {
            let level = classify(step as f64 / 100.0, &AUDIT_BREAKPOINTS);
            assert!(level >= previous);
            previous = level;
        }
    }

    #[test]
    fn test_nan_is_low() {
        assert_eq!(classify(f64::NAN, &STOCKOUT_BREAKPOINTS), RiskLevel::Low);
    }
}
