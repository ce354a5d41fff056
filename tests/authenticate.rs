use chrono::{DateTime, Duration, TimeZone, Utc};
use riskgate::risk::{
    AuthError, Authenticator, Clock, CredentialDirectory, Decision, Environment, FixedJitter,
    Identity, InMemoryDirectory, InMemoryLedger, Ledger, RiskEngine, RiskFactor, RiskLevel,
    SeededJitter,
};
use secrecy::SecretString;
use std::sync::{Arc, Mutex};
use std::thread;

struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    fn at(hour: u32, minute: u32) -> Arc<Self> {
        let start = Utc
            .with_ymd_and_hms(2024, 11, 5, hour, minute, 0)
            .single()
            .unwrap_or_default();
        Arc::new(Self(Mutex::new(start)))
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

struct Harness {
    auth: Authenticator,
    ledger: Arc<InMemoryLedger>,
    clock: Arc<ManualClock>,
}

const PASSWORD: &str = "correct horse battery";

fn secret(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

fn harness(clock: Arc<ManualClock>, identities: &[&str]) -> Harness {
    let directory = Arc::new(InMemoryDirectory::new());
    for identity in identities {
        let registered = directory.register(&Identity::new(*identity), "User", &secret(PASSWORD));
        assert!(registered.is_ok());
    }
    let ledger = Arc::new(InMemoryLedger::new());
    let auth = Authenticator::new(
        directory,
        ledger.clone(),
        RiskEngine::new(Arc::new(FixedJitter::zero())),
    )
    .with_clock(clock.clone());
    Harness {
        auth,
        ledger,
        clock,
    }
}

fn laptop() -> Environment {
    Environment::new("192.0.2.10", "Firefox on Linux", "Lisbon, Portugal")
}

fn phone_abroad() -> Environment {
    Environment::new("198.51.100.77", "Safari on iOS", "Manila, Philippines")
}

#[test]
fn first_attempt_never_fires_history_factors() {
    // 03:00 is inside the nocturnal window, so only that factor can fire.
    let h = harness(ManualClock::at(3, 0), &["alice@example.com"]);
    let alice = Identity::new("alice@example.com");

    let admission = h.auth.attempt(&alice, &secret(PASSWORD), phone_abroad());
    let Ok(admission) = admission else {
        panic!("expected admission, got {admission:?}");
    };
    assert_eq!(admission.factors, vec![RiskFactor::UnusualHour]);
    assert_eq!(admission.score, 15);
    assert_eq!(admission.level, RiskLevel::Low);
}

#[test]
fn known_environment_at_night_scores_fifteen() {
    let h = harness(ManualClock::at(1, 0), &["alice@example.com"]);
    let alice = Identity::new("alice@example.com");

    assert!(h.auth.attempt(&alice, &secret(PASSWORD), laptop()).is_ok());
    h.clock.advance(Duration::minutes(30));

    let admission = h.auth.attempt(&alice, &secret(PASSWORD), laptop());
    let Ok(admission) = admission else {
        panic!("expected admission, got {admission:?}");
    };
    assert_eq!(admission.score, 15);
    assert_eq!(admission.level, RiskLevel::Low);
    assert_eq!(admission.decision, Decision::Allowed);
}

#[test]
fn new_device_and_address_by_day_scores_sixty() {
    let h = harness(ManualClock::at(9, 0), &["alice@example.com"]);
    let alice = Identity::new("alice@example.com");

    assert!(h.auth.attempt(&alice, &secret(PASSWORD), laptop()).is_ok());
    h.clock.advance(Duration::hours(4));

    let admission = h.auth.attempt(&alice, &secret(PASSWORD), phone_abroad());
    let Ok(admission) = admission else {
        panic!("expected admission, got {admission:?}");
    };
    assert_eq!(admission.score, 60);
    assert_eq!(admission.level, RiskLevel::Medium);
    assert_eq!(admission.decision, Decision::Flagged);
    assert!(admission.session_established);
}

#[test]
fn every_factor_firing_blocks_and_still_records() {
    let h = harness(ManualClock::at(2, 0), &["alice@example.com"]);
    let alice = Identity::new("alice@example.com");

    assert!(h.auth.attempt(&alice, &secret(PASSWORD), laptop()).is_ok());
    h.clock.advance(Duration::seconds(10));

    let result = h.auth.attempt(&alice, &secret(PASSWORD), phone_abroad());
    assert_eq!(result, Err(AuthError::RiskBlocked { score: 85 }));

    let entries = h.ledger.entries(&alice).unwrap_or_default();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].decision, Decision::Blocked);
}

#[test]
fn ledger_grows_by_one_per_verified_attempt_only() {
    let h = harness(ManualClock::at(12, 0), &["alice@example.com"]);
    let alice = Identity::new("alice@example.com");

    let before = h.ledger.count();
    assert_eq!(
        h.auth.attempt(&alice, &secret("wrong"), laptop()),
        Err(AuthError::InvalidCredentials)
    );
    assert_eq!(h.ledger.count(), before);

    for step in 1..=3 {
        h.clock.advance(Duration::minutes(5));
        assert!(h.auth.attempt(&alice, &secret(PASSWORD), laptop()).is_ok());
        assert_eq!(h.ledger.count(), before + step);
    }
}

#[test]
fn identities_do_not_influence_each_other() {
    let h = harness(
        ManualClock::at(14, 0),
        &["alice@example.com", "bob@example.com"],
    );
    let alice = Identity::new("alice@example.com");
    let bob = Identity::new("bob@example.com");

    for _ in 0..5 {
        h.clock.advance(Duration::minutes(2));
        assert!(h.auth.attempt(&alice, &secret(PASSWORD), laptop()).is_ok());
    }

    // Bob's first attempt sees no history even right after Alice's.
    let admission = h.auth.attempt(&bob, &secret(PASSWORD), phone_abroad());
    let Ok(admission) = admission else {
        panic!("expected admission, got {admission:?}");
    };
    assert_eq!(admission.score, 0);
    assert!(admission.factors.is_empty());
    assert_eq!(h.ledger.entries(&bob).map(|e| e.len()), Ok(1));
    assert_eq!(h.ledger.entries(&alice).map(|e| e.len()), Ok(5));
}

#[test]
fn scores_stay_within_bounds() {
    let clock = ManualClock::at(0, 30);
    let directory = Arc::new(InMemoryDirectory::new());
    let alice = Identity::new("alice@example.com");
    assert!(directory.register(&alice, "Alice", &secret(PASSWORD)).is_ok());
    let auth = Authenticator::new(
        directory,
        Arc::new(InMemoryLedger::new()),
        RiskEngine::new(Arc::new(SeededJitter::new(42))),
    )
    .with_clock(clock.clone());

    for round in 0..40_u32 {
        clock.advance(Duration::seconds(5));
        let environment = Environment::new(
            format!("203.0.113.{round}"),
            format!("Device {round}"),
            "Unknown Location",
        );
        let score = match auth.attempt(&alice, &secret(PASSWORD), environment) {
            Ok(admission) => admission.score,
            Err(AuthError::RiskBlocked { score }) => score,
            Err(err) => panic!("unexpected failure: {err}"),
        };
        assert!(score <= 100);
    }
}

fn replay() -> Vec<(u8, Decision)> {
    let h = harness(ManualClock::at(4, 0), &["alice@example.com"]);
    let alice = Identity::new("alice@example.com");
    let script = [
        (laptop(), Duration::minutes(0)),
        (laptop(), Duration::seconds(20)),
        (phone_abroad(), Duration::hours(3)),
        (phone_abroad(), Duration::seconds(5)),
        (laptop(), Duration::hours(8)),
    ];

    script
        .into_iter()
        .map(|(environment, wait)| {
            h.clock.advance(wait);
            match h.auth.attempt(&alice, &secret(PASSWORD), environment) {
                Ok(admission) => (admission.score, admission.decision),
                Err(AuthError::RiskBlocked { score }) => (score, Decision::Blocked),
                Err(err) => panic!("unexpected failure: {err}"),
            }
        })
        .collect()
}

#[test]
fn replay_is_deterministic_with_pinned_jitter() {
    let first = replay();
    assert_eq!(first, replay());
    assert_eq!(
        first,
        vec![
            (15, Decision::Allowed),
            (25, Decision::Allowed),
            (60, Decision::Flagged),
            (10, Decision::Allowed),
            (0, Decision::Allowed),
        ]
    );
}

#[test]
fn concurrent_attempts_for_one_identity_each_see_the_previous() {
    let h = harness(ManualClock::at(12, 0), &["alice@example.com"]);
    let auth = Arc::new(h.auth);
    let alice = Identity::new("alice@example.com");

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let auth = Arc::clone(&auth);
            let alice = alice.clone();
            thread::spawn(move || {
                (0..5)
                    .filter_map(|_| auth.attempt(&alice, &secret(PASSWORD), laptop()).ok())
                    .count()
            })
        })
        .collect();

    let admitted: usize = handles
        .into_iter()
        .map(|handle| handle.join().unwrap_or_default())
        .sum();

    assert_eq!(admitted, 20);
    let entries = h.ledger.entries(&alice).unwrap_or_default();
    assert_eq!(entries.len(), 20);
    // Same frozen clock: every attempt after the first saw a predecessor.
    assert_eq!(entries.iter().filter(|entry| entry.score == 10).count(), 19);
}

#[test]
fn recovery_then_history_view() {
    let h = harness(ManualClock::at(22, 0), &["alice@example.com"]);
    let alice = Identity::new("alice@example.com");

    assert!(h.auth.recover(&alice, phone_abroad()).is_ok());
    h.clock.advance(Duration::minutes(10));
    let admission = h.auth.attempt(&alice, &secret(PASSWORD), laptop());
    let Ok(admission) = admission else {
        panic!("expected admission, got {admission:?}");
    };
    assert_eq!(admission.score, 60);

    let history = h.auth.history(&alice).unwrap_or_default();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].entry.attributes.device, "Firefox on Linux");
    assert_eq!(history[0].level, RiskLevel::Medium);
    assert_eq!(history[1].entry.score, 0);
    assert_eq!(history[1].entry.decision, Decision::Allowed);
}
