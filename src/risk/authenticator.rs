//! Authentication orchestration: credential check, scoring, decision, ledger.
//!
//! Flow Overview:
//! 1) Verify the secret with the credential directory. A mismatch ends the
//!    attempt before the ledger or engine are touched.
//! 2) Stamp the caller's environment with the identity and the current time.
//! 3) Inside the ledger's per-identity critical section, score the attempt
//!    against the history snapshot, classify it and append the entry. Blocked
//!    attempts are recorded too.
//! 4) Return `RiskBlocked` for blocked attempts, otherwise an admission with a
//!    session grant.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::classifier::{classify, decide};
use super::directory::{CredentialDirectory, Verification};
use super::engine::RiskEngine;
use super::error::{AuthError, DirectoryError};
use super::ledger::Ledger;
use super::types::{
    Decision, EntryId, Environment, Identity, LedgerEntry, PendingEntry, RiskAssessment,
    RiskFactor, RiskLevel,
};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Per-attempt state; nothing here survives the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Pending,
    CredentialCheck,
    Rejected,
    Scoring,
    Decision,
    Blocked,
    SessionGranted,
}

impl AttemptState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Blocked | Self::SessionGranted)
    }

    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::CredentialCheck)
                | (Self::CredentialCheck, Self::Rejected | Self::Scoring)
                | (Self::Scoring, Self::Decision)
                | (Self::Decision, Self::Blocked | Self::SessionGranted)
        )
    }
}

/// Successful outcome of an attempt; a session is granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Admission {
    pub identity: Identity,
    pub entry_id: EntryId,
    pub score: u8,
    pub level: RiskLevel,
    pub decision: Decision,
    pub factors: Vec<RiskFactor>,
    pub session_established: bool,
}

impl Admission {
    /// Flagged attempts are admitted but the caller should be warned.
    #[must_use]
    pub fn warning(&self) -> Option<&'static str> {
        match self.decision {
            Decision::Flagged => Some("Unusual activity detected on this sign-in."),
            Decision::Allowed | Decision::Blocked => None,
        }
    }
}

/// Ledger entry as shown in a history view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryItem {
    #[serde(flatten)]
    pub entry: LedgerEntry,
    pub level: RiskLevel,
}

pub struct Authenticator {
    directory: Arc<dyn CredentialDirectory>,
    ledger: Arc<dyn Ledger>,
    engine: RiskEngine,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    #[must_use]
    pub fn new(
        directory: Arc<dyn CredentialDirectory>,
        ledger: Arc<dyn Ledger>,
        engine: RiskEngine,
    ) -> Self {
        Self {
            directory,
            ledger,
            engine,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn directory(&self) -> &dyn CredentialDirectory {
        self.directory.as_ref()
    }

    #[must_use]
    pub fn ledger(&self) -> &dyn Ledger {
        self.ledger.as_ref()
    }

    /// Evaluate one authentication attempt.
    ///
    /// # Errors
    /// - `InvalidCredentials` / `IdentityUnknown`: nothing scored or recorded.
    /// - `RiskBlocked`: the attempt was recorded, no session.
    /// - `LedgerUnavailable`: nothing recorded, no session.
    /// - `DirectoryUnavailable`: the credential check could not run.
    #[instrument(skip_all, fields(identity = %identity))]
    pub fn attempt(
        &self,
        identity: &Identity,
        secret: &SecretString,
        environment: Environment,
    ) -> Result<Admission, AuthError> {
        let mut state = AttemptState::Pending;
        advance(&mut state, AttemptState::CredentialCheck);

        let verified = match self.directory.verify(identity, secret) {
            Ok(Verification::Matched(verified)) => verified,
            Ok(Verification::Mismatch) => {
                advance(&mut state, AttemptState::Rejected);
                info!("credential mismatch");
                return Err(AuthError::InvalidCredentials);
            }
            Ok(Verification::Unknown) => {
                advance(&mut state, AttemptState::Rejected);
                info!("unknown identity");
                return Err(AuthError::IdentityUnknown);
            }
            Err(err) => {
                advance(&mut state, AttemptState::Rejected);
                warn!("credential directory failed: {err}");
                return Err(AuthError::DirectoryUnavailable(err.to_string()));
            }
        };

        advance(&mut state, AttemptState::Scoring);
        let attributes = environment.stamp(verified.clone(), self.clock.now());

        let mut assessment: Option<RiskAssessment> = None;
        let entry = self.ledger.append_with(&verified, &mut |history| {
            let scored = self.engine.score(&attributes, history);
            let decision = decide(scored.level);
            let pending = PendingEntry {
                attributes: attributes.clone(),
                score: scored.score,
                decision,
            };
            assessment = Some(scored);
            pending
        });

        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("attempt aborted, history not recorded: {err}");
                return Err(err.into());
            }
        };
        let Some(assessment) = assessment else {
            warn!(entry = entry.id.get(), "ledger recorded an entry without scoring it");
            return Err(AuthError::LedgerUnavailable(
                "attempt was not evaluated".to_string(),
            ));
        };

        advance(&mut state, AttemptState::Decision);
        info!(
            score = assessment.score,
            level = %assessment.level,
            decision = %entry.decision,
            factors = ?assessment.factors,
            "attempt scored"
        );

        if entry.decision == Decision::Blocked {
            advance(&mut state, AttemptState::Blocked);
            return Err(AuthError::RiskBlocked {
                score: assessment.score,
            });
        }

        advance(&mut state, AttemptState::SessionGranted);
        Ok(Admission {
            identity: verified,
            entry_id: entry.id,
            score: assessment.score,
            level: assessment.level,
            decision: entry.decision,
            factors: assessment.factors,
            session_established: true,
        })
    }

    /// Sign in an identity that proved control of its mailbox out of band.
    ///
    /// The attempt is recorded with score 0 and outcome `allowed`, without
    /// scoring.
    ///
    /// # Errors
    /// `IdentityUnknown` if the directory has no such identity,
    /// `LedgerUnavailable` if the entry cannot be recorded.
    #[instrument(skip_all, fields(identity = %identity))]
    pub fn recover(
        &self,
        identity: &Identity,
        environment: Environment,
    ) -> Result<Admission, AuthError> {
        match self.directory.contains(identity) {
            Ok(true) => {}
            Ok(false) => return Err(AuthError::IdentityUnknown),
            Err(DirectoryError::Unavailable(reason)) => {
                return Err(AuthError::DirectoryUnavailable(reason));
            }
            Err(err) => return Err(AuthError::DirectoryUnavailable(err.to_string())),
        }

        let attributes = environment.stamp(identity.clone(), self.clock.now());
        let entry = self.ledger.append_with(identity, &mut |_| PendingEntry {
            attributes: attributes.clone(),
            score: 0,
            decision: Decision::Allowed,
        })?;

        info!(entry_id = %entry.id, "verified recovery recorded");

        Ok(Admission {
            identity: identity.clone(),
            entry_id: entry.id,
            score: 0,
            level: classify(0),
            decision: Decision::Allowed,
            factors: Vec::new(),
            session_established: true,
        })
    }

    /// The identity's attempts, most recent first.
    ///
    /// # Errors
    /// `LedgerUnavailable` if the history cannot be read.
    pub fn history(&self, identity: &Identity) -> Result<Vec<HistoryItem>, AuthError> {
        let mut entries = self.ledger.entries(identity)?;
        entries.reverse();
        Ok(entries
            .into_iter()
            .map(|entry| HistoryItem {
                level: classify(entry.score),
                entry,
            })
            .collect())
    }
}

fn advance(state: &mut AttemptState, next: AttemptState) {
    debug_assert!(
        state.can_transition_to(next),
        "invalid attempt transition {state:?} -> {next:?}"
    );
    debug!(from = ?state, to = ?next, "attempt transition");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::directory::InMemoryDirectory;
    use crate::risk::engine::FixedJitter;
    use crate::risk::error::LedgerError;
    use crate::risk::ledger::{Evaluate, InMemoryLedger};
    use chrono::{Duration, TimeZone};
    use std::sync::Mutex;

    struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn at(hour: u32, minute: u32, second: u32) -> Self {
            let start = Utc
                .with_ymd_and_hms(2024, 6, 1, hour, minute, second)
                .single()
                .unwrap_or_default();
            Self(Mutex::new(start))
        }

        fn advance(&self, by: Duration) {
            if let Ok(mut now) = self.0.lock() {
                *now += by;
            }
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            self.0.lock().map(|now| *now).unwrap_or_default()
        }
    }

    struct UnavailableLedger;

    impl Ledger for UnavailableLedger {
        fn append_with(
            &self,
            _identity: &Identity,
            _evaluate: &mut Evaluate<'_>,
        ) -> Result<LedgerEntry, LedgerError> {
            Err(LedgerError::Unavailable("disk full".to_string()))
        }

        fn entries(&self, _identity: &Identity) -> Result<Vec<LedgerEntry>, LedgerError> {
            Err(LedgerError::Unavailable("disk full".to_string()))
        }

        fn is_available(&self) -> bool {
            false
        }
    }

    // Appends without ever handing the history to the evaluator.
    struct SkippingLedger;

    impl Ledger for SkippingLedger {
        fn append_with(
            &self,
            identity: &Identity,
            _evaluate: &mut Evaluate<'_>,
        ) -> Result<LedgerEntry, LedgerError> {
            Ok(LedgerEntry {
                id: EntryId::new(1),
                attributes: home().stamp(identity.clone(), Utc::now()),
                score: 0,
                decision: Decision::Allowed,
            })
        }

        fn entries(&self, _identity: &Identity) -> Result<Vec<LedgerEntry>, LedgerError> {
            Ok(Vec::new())
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    fn setup(clock: Arc<ManualClock>) -> (Authenticator, Arc<InMemoryLedger>, Identity) {
        let directory = Arc::new(InMemoryDirectory::new());
        let alice = Identity::new("alice@example.com");
        let _ = directory.register(&alice, "Alice", &secret("correct horse"));
        let ledger = Arc::new(InMemoryLedger::new());
        let auth = Authenticator::new(
            directory,
            ledger.clone(),
            RiskEngine::new(Arc::new(FixedJitter::zero())),
        )
        .with_clock(clock);
        (auth, ledger, alice)
    }

    fn home() -> Environment {
        Environment::new("10.0.0.1", "Chrome on Linux", "Lisbon, Portugal")
    }

    fn elsewhere() -> Environment {
        Environment::new("203.0.113.9", "Safari on iOS", "Reykjavik, Iceland")
    }

    #[test]
    fn state_machine_edges() {
        use AttemptState as S;
        assert!(S::Pending.can_transition_to(S::CredentialCheck));
        assert!(S::CredentialCheck.can_transition_to(S::Rejected));
        assert!(S::CredentialCheck.can_transition_to(S::Scoring));
        assert!(S::Scoring.can_transition_to(S::Decision));
        assert!(S::Decision.can_transition_to(S::Blocked));
        assert!(S::Decision.can_transition_to(S::SessionGranted));
        assert!(!S::Pending.can_transition_to(S::Scoring));
        assert!(!S::Rejected.can_transition_to(S::Scoring));
        assert!(!S::Blocked.can_transition_to(S::SessionGranted));
        assert!(S::Rejected.is_terminal());
        assert!(S::Blocked.is_terminal());
        assert!(S::SessionGranted.is_terminal());
        assert!(!S::Scoring.is_terminal());
    }

    #[test]
    fn wrong_secret_records_nothing() {
        let (auth, ledger, alice) = setup(Arc::new(ManualClock::at(12, 0, 0)));

        let result = auth.attempt(&alice, &secret("wrong"), home());
        assert_eq!(result, Err(AuthError::InvalidCredentials));
        assert_eq!(ledger.count(), 0);
    }

    #[test]
    fn unknown_identity_is_reported_when_directory_distinguishes() {
        let directory = Arc::new(InMemoryDirectory::new().with_distinguish_unknown(true));
        let ledger = Arc::new(InMemoryLedger::new());
        let auth = Authenticator::new(directory, ledger.clone(), RiskEngine::default());

        let result = auth.attempt(&Identity::new("ghost@example.com"), &secret("x"), home());
        assert_eq!(result, Err(AuthError::IdentityUnknown));
        assert_eq!(ledger.count(), 0);
    }

    #[test]
    fn first_login_is_allowed() {
        let (auth, ledger, alice) = setup(Arc::new(ManualClock::at(12, 0, 0)));

        let admission = auth.attempt(&alice, &secret("correct horse"), home());
        let Ok(admission) = admission else {
            panic!("expected admission, got {admission:?}");
        };
        assert_eq!(admission.score, 0);
        assert_eq!(admission.decision, Decision::Allowed);
        assert!(admission.session_established);
        assert!(admission.warning().is_none());
        assert_eq!(ledger.count(), 1);
    }

    #[test]
    fn new_environment_is_flagged_with_warning() {
        let clock = Arc::new(ManualClock::at(12, 0, 0));
        let (auth, _ledger, alice) = setup(clock.clone());

        assert!(auth.attempt(&alice, &secret("correct horse"), home()).is_ok());
        clock.advance(Duration::hours(2));

        let admission = auth.attempt(&alice, &secret("correct horse"), elsewhere());
        let Ok(admission) = admission else {
            panic!("expected admission, got {admission:?}");
        };
        assert_eq!(admission.score, 60);
        assert_eq!(admission.level, RiskLevel::Medium);
        assert_eq!(admission.decision, Decision::Flagged);
        assert!(admission.warning().is_some());
    }

    #[test]
    fn high_risk_is_blocked_but_recorded() {
        let clock = Arc::new(ManualClock::at(3, 0, 0));
        let (auth, ledger, alice) = setup(clock.clone());

        assert!(auth.attempt(&alice, &secret("correct horse"), home()).is_ok());
        clock.advance(Duration::seconds(20));

        let result = auth.attempt(&alice, &secret("correct horse"), elsewhere());
        assert_eq!(result, Err(AuthError::RiskBlocked { score: 85 }));

        let entries = ledger.entries(&alice).unwrap_or_default();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].decision, Decision::Blocked);
        assert_eq!(entries[1].score, 85);
    }

    #[test]
    fn ledger_failure_aborts_attempt() {
        let directory = Arc::new(InMemoryDirectory::new());
        let alice = Identity::new("alice@example.com");
        let _ = directory.register(&alice, "Alice", &secret("pw"));
        let auth = Authenticator::new(
            directory,
            Arc::new(UnavailableLedger),
            RiskEngine::new(Arc::new(FixedJitter::zero())),
        );

        let result = auth.attempt(&alice, &secret("pw"), home());
        assert!(matches!(result, Err(AuthError::LedgerUnavailable(_))));
        assert!(!auth.ledger().is_available());
    }

    #[test]
    fn unscored_entry_never_grants_a_session() {
        let directory = Arc::new(InMemoryDirectory::new());
        let alice = Identity::new("alice@example.com");
        let _ = directory.register(&alice, "Alice", &secret("pw"));
        let auth = Authenticator::new(
            directory,
            Arc::new(SkippingLedger),
            RiskEngine::new(Arc::new(FixedJitter::zero())),
        );

        let result = auth.attempt(&alice, &secret("pw"), home());
        assert!(matches!(result, Err(AuthError::LedgerUnavailable(_))));
    }

    #[test]
    fn recovery_records_zero_score_entry() {
        let clock = Arc::new(ManualClock::at(2, 0, 0));
        let (auth, ledger, alice) = setup(clock);

        let admission = auth.recover(&alice, elsewhere());
        let Ok(admission) = admission else {
            panic!("expected admission, got {admission:?}");
        };
        assert_eq!(admission.score, 0);
        assert_eq!(admission.decision, Decision::Allowed);

        let entries = ledger.entries(&alice).unwrap_or_default();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].score, 0);
        assert_eq!(entries[0].attributes.device, "Safari on iOS");

        assert_eq!(
            auth.recover(&Identity::new("ghost@example.com"), home()),
            Err(AuthError::IdentityUnknown)
        );
        assert_eq!(ledger.count(), 1);
    }

    #[test]
    fn history_is_most_recent_first_with_levels() {
        let clock = Arc::new(ManualClock::at(12, 0, 0));
        let (auth, _ledger, alice) = setup(clock.clone());

        assert!(auth.attempt(&alice, &secret("correct horse"), home()).is_ok());
        clock.advance(Duration::hours(1));
        assert!(auth.attempt(&alice, &secret("correct horse"), elsewhere()).is_ok());

        let history = auth.history(&alice).unwrap_or_default();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].entry.score, 60);
        assert_eq!(history[0].level, RiskLevel::Medium);
        assert_eq!(history[1].entry.score, 0);
        assert_eq!(history[1].level, RiskLevel::Low);
        assert!(history[0].entry.id > history[1].entry.id);
    }
}
