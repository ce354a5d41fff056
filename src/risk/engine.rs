//! Additive risk scoring.
//!
//! Every factor either fires or does not and contributes a fixed weight. A
//! residual jitter in `0..10` is added last, drawn from an injectable
//! [`JitterSource`] so scoring can be pinned under test. The total is clamped
//! into `0..=100`.

use chrono::{FixedOffset, Offset, Timelike, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use super::classifier::classify;
use super::types::{AttemptAttributes, LedgerEntry, RiskAssessment, RiskFactor};

pub const MAX_SCORE: u8 = 100;
/// Exclusive upper bound of the jitter contribution.
pub const JITTER_BOUND: u8 = 10;
/// Nocturnal window `[0, 5)` in local hours.
pub const UNUSUAL_HOUR_END: u32 = 5;
pub const VELOCITY_WINDOW_SECONDS: i64 = 60;

/// Source of the residual-uncertainty contribution.
pub trait JitterSource: Send + Sync {
    /// Returns a value in `0..JITTER_BOUND`.
    fn next(&self) -> u8;
}

/// Production jitter from the thread-local generator.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn next(&self) -> u8 {
        rand::thread_rng().gen_range(0..JITTER_BOUND)
    }
}

/// Constant jitter, clamped below [`JITTER_BOUND`].
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedJitter(u8);

impl FixedJitter {
    #[must_use]
    pub fn new(value: u8) -> Self {
        Self(value.min(JITTER_BOUND - 1))
    }

    #[must_use]
    pub fn zero() -> Self {
        Self(0)
    }
}

impl JitterSource for FixedJitter {
    fn next(&self) -> u8 {
        self.0
    }
}

/// Reproducible jitter sequence from a seeded `ChaCha20Rng`.
#[derive(Debug)]
pub struct SeededJitter {
    rng: Mutex<ChaCha20Rng>,
}

impl SeededJitter {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
        }
    }
}

impl JitterSource for SeededJitter {
    fn next(&self) -> u8 {
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(0..JITTER_BOUND),
            Err(poisoned) => poisoned.into_inner().gen_range(0..JITTER_BOUND),
        }
    }
}

/// Stateless scorer; safe to share across concurrent callers.
#[derive(Clone)]
pub struct RiskEngine {
    jitter: Arc<dyn JitterSource>,
    offset: FixedOffset,
}

impl std::fmt::Debug for RiskEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskEngine")
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

impl Default for RiskEngine {
    fn default() -> Self {
        Self::new(Arc::new(ThreadRngJitter))
    }
}

impl RiskEngine {
    #[must_use]
    pub fn new(jitter: Arc<dyn JitterSource>) -> Self {
        Self {
            jitter,
            offset: utc(),
        }
    }

    /// Offset used to derive the local hour of an attempt.
    #[must_use]
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Score `attempt` against the identity's prior entries, oldest first.
    #[must_use]
    pub fn score(&self, attempt: &AttemptAttributes, history: &[LedgerEntry]) -> RiskAssessment {
        let factors = self.factors(attempt, history);
        let fired: u32 = factors.iter().map(|factor| factor.weight()).sum();
        let jitter = u32::from(self.jitter.next().min(JITTER_BOUND - 1));
        let score = u8::try_from(fired + jitter).map_or(MAX_SCORE, |total| total.min(MAX_SCORE));

        RiskAssessment {
            score,
            level: classify(score),
            factors,
        }
    }

    fn factors(&self, attempt: &AttemptAttributes, history: &[LedgerEntry]) -> Vec<RiskFactor> {
        let mut factors = Vec::new();

        if !history.is_empty() {
            let devices: HashSet<&str> = history
                .iter()
                .map(|entry| entry.attributes.device.as_str())
                .collect();
            if !devices.contains(attempt.device.as_str()) {
                factors.push(RiskFactor::NewDevice);
            }

            let addresses: HashSet<&str> = history
                .iter()
                .map(|entry| entry.attributes.network_address.as_str())
                .collect();
            if !addresses.contains(attempt.network_address.as_str()) {
                factors.push(RiskFactor::NewNetworkAddress);
            }
        }

        if attempt.timestamp.with_timezone(&self.offset).hour() < UNUSUAL_HOUR_END {
            factors.push(RiskFactor::UnusualHour);
        }

        // Clock skew (a negative interval) also counts as a burst.
        if let Some(last) = history.last() {
            let elapsed = attempt.timestamp - last.attributes.timestamp;
            if elapsed.num_seconds() < VELOCITY_WINDOW_SECONDS {
                factors.push(RiskFactor::Velocity);
            }
        }

        factors
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}
