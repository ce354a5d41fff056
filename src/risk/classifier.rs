//! Score to level and level to decision mapping.
//!
//! This is the only threshold table in the crate. The history view and the
//! login response both classify through [`classify`].

use super::types::{Decision, RiskLevel};

pub const MEDIUM_THRESHOLD: u8 = 40;
pub const HIGH_THRESHOLD: u8 = 70;

/// Classify a score; scores above 100 are treated as 100.
#[must_use]
pub const fn classify(score: u8) -> RiskLevel {
    if score >= HIGH_THRESHOLD {
        RiskLevel::High
    } else if score >= MEDIUM_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Decision for an attempt whose credentials were already verified.
#[must_use]
pub const fn decide(level: RiskLevel) -> Decision {
    match level {
        RiskLevel::Low => Decision::Allowed,
        RiskLevel::Medium => Decision::Flagged,
        RiskLevel::High => Decision::Blocked,
    }
}
