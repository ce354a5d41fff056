//! Value types shared by the scoring engine, the classifier and the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable key under which attempt history is grouped (an email address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Environment attributes of a single authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptAttributes {
    pub identity: Identity,
    pub network_address: String,
    pub device: String,
    pub location: String,
    pub timestamp: DateTime<Utc>,
}

/// Caller-supplied part of an attempt; the orchestrator stamps identity and time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Environment {
    pub network_address: String,
    pub device: String,
    pub location: String,
}

impl Environment {
    #[must_use]
    pub fn new(
        network_address: impl Into<String>,
        device: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            network_address: network_address.into(),
            device: device.into(),
            location: location.into(),
        }
    }

    pub(crate) fn stamp(self, identity: Identity, timestamp: DateTime<Utc>) -> AttemptAttributes {
        AttemptAttributes {
            identity,
            network_address: self.network_address,
            device: self.device,
            location: self.location,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Gating decision recorded for an attempt with valid credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allowed,
    Flagged,
    Blocked,
}

impl Decision {
    #[must_use]
    pub fn establishes_session(self) -> bool {
        !matches!(self, Self::Blocked)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allowed => write!(f, "allowed"),
            Self::Flagged => write!(f, "flagged"),
            Self::Blocked => write!(f, "blocked"),
        }
    }
}

/// A signal that raised the score of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    NewDevice,
    NewNetworkAddress,
    UnusualHour,
    Velocity,
}

impl RiskFactor {
    /// Fixed contribution of the factor when it fires.
    #[must_use]
    pub const fn weight(self) -> u32 {
        match self {
            Self::NewDevice => 40,
            Self::NewNetworkAddress => 20,
            Self::UnusualHour => 15,
            Self::Velocity => 10,
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::NewDevice => "New device detected",
            Self::NewNetworkAddress => "New IP address",
            Self::UnusualHour => "Unusual login time (Late night)",
            Self::Velocity => "High frequency login attempt",
        }
    }
}

impl fmt::Display for RiskFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Output of the scoring engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Always within `0..=100`.
    pub score: u8,
    pub level: RiskLevel,
    /// Factors that fired, in evaluation order. Jitter is never listed.
    pub factors: Vec<RiskFactor>,
}

/// Identifier assigned by the ledger; strictly increasing in append order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(u64);

impl EntryId {
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entry handed to the ledger before it is assigned an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub attributes: AttemptAttributes,
    pub score: u8,
    pub decision: Decision,
}

/// Immutable record of a completed attempt with valid credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub attributes: AttemptAttributes,
    pub score: u8,
    pub decision: Decision,
}

impl LedgerEntry {
    pub(crate) fn from_pending(id: EntryId, pending: PendingEntry) -> Self {
        Self {
            id,
            attributes: pending.attributes,
            score: pending.score,
            decision: pending.decision,
        }
    }
}
