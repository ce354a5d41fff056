//! Login risk evaluation core.
//!
//! Given an authentication attempt and the identity's prior attempts, the core
//! produces a bounded score, a level and a decision, and records the attempt.
//!
//! - [`engine`]: additive factor scoring with an injectable jitter source.
//! - [`classifier`]: the single threshold table (`<40` low, `<70` medium, else
//!   high) and the level to decision mapping.
//! - [`ledger`]: append-only, per-identity history with per-identity
//!   serialization of read-then-append.
//! - [`authenticator`]: credential check, scoring, decision and ledger append.
//!
//! Nothing here performs network or disk I/O; collaborators (credential
//! directory, geolocation, notifications) hand the core already-resolved values.

pub mod authenticator;
pub mod classifier;
pub mod device;
pub mod directory;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod types;

pub use authenticator::{Admission, AttemptState, Authenticator, Clock, HistoryItem, SystemClock};
pub use classifier::{classify, decide};
pub use directory::{CredentialDirectory, InMemoryDirectory, Verification};
pub use engine::{FixedJitter, JitterSource, RiskEngine, SeededJitter, ThreadRngJitter};
pub use error::{AuthError, DirectoryError, LedgerError};
pub use ledger::{InMemoryLedger, Ledger};
pub use types::{
    AttemptAttributes, Decision, EntryId, Environment, Identity, LedgerEntry, RiskAssessment,
    RiskFactor, RiskLevel,
};
