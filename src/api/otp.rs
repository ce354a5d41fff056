//! One-time sign-in codes for out-of-band recovery.
//!
//! A code is six digits, lives for a configurable TTL and can be redeemed once.
//! Issuing a new code for an identity replaces the previous one.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;
use subtle::ConstantTimeEq;
use tracing::{debug, error};

use crate::risk::Identity;

const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;
/// Wrong guesses allowed before the pending code is discarded.
const MAX_ATTEMPTS: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OtpError {
    #[error("no pending code")]
    Missing,
    #[error("code expired")]
    Expired,
    #[error("code does not match")]
    Mismatch,
}

#[derive(Debug)]
struct PendingCode {
    code: String,
    expires_at: DateTime<Utc>,
    attempts: u8,
}

#[derive(Debug)]
pub struct OtpStore {
    ttl: Duration,
    codes: Mutex<HashMap<Identity, PendingCode>>,
}

impl OtpStore {
    #[must_use]
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_seconds.max(1)),
            codes: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a fresh code for `identity`.
    #[must_use]
    pub fn issue(&self, identity: &Identity) -> String {
        let code = generate_code();
        let now = Utc::now();
        match self.codes.lock() {
            Ok(mut codes) => {
                codes.retain(|_, pending| pending.expires_at > now);
                codes.insert(
                    identity.clone(),
                    PendingCode {
                        code: code.clone(),
                        expires_at: now + self.ttl,
                        attempts: 0,
                    },
                );
            }
            Err(_) => error!("otp store lock poisoned"),
        }
        debug!(identity = %identity, "one-time code issued");
        code
    }

    /// Redeem `code`; a successful redemption consumes it.
    ///
    /// # Errors
    /// `Missing` when no code is pending, `Expired` past the TTL, `Mismatch`
    /// for a wrong code.
    pub fn redeem(&self, identity: &Identity, code: &str) -> Result<(), OtpError> {
        let Ok(mut codes) = self.codes.lock() else {
            error!("otp store lock poisoned");
            return Err(OtpError::Missing);
        };
        let Some(pending) = codes.get_mut(identity) else {
            return Err(OtpError::Missing);
        };

        if pending.expires_at <= Utc::now() {
            codes.remove(identity);
            return Err(OtpError::Expired);
        }

        if !codes_match(&pending.code, code.trim()) {
            pending.attempts += 1;
            if pending.attempts >= MAX_ATTEMPTS {
                codes.remove(identity);
            }
            return Err(OtpError::Mismatch);
        }

        codes.remove(identity);
        Ok(())
    }
}

fn codes_match(expected: &str, supplied: &str) -> bool {
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}

fn generate_code() -> String {
    rand::thread_rng().gen_range(CODE_MIN..=CODE_MAX).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn code_comparison_is_exact() {
        assert!(codes_match("123456", "123456"));
        assert!(!codes_match("123456", "123457"));
        assert!(!codes_match("123456", "12345"));
        assert!(!codes_match("123456", ""));
    }

    #[test]
    fn code_is_single_use() {
        let store = OtpStore::new(300);
        let alice = Identity::new("alice@example.com");
        let code = store.issue(&alice);

        assert_eq!(store.redeem(&alice, &code), Ok(()));
        assert_eq!(store.redeem(&alice, &code), Err(OtpError::Missing));
    }

    #[test]
    fn reissue_replaces_previous_code() {
        let store = OtpStore::new(300);
        let alice = Identity::new("alice@example.com");
        let first = store.issue(&alice);
        let second = store.issue(&alice);

        if first != second {
            assert_eq!(store.redeem(&alice, &first), Err(OtpError::Mismatch));
        }
        assert_eq!(store.redeem(&alice, &second), Ok(()));
    }

    #[test]
    fn repeated_mismatches_discard_code() {
        let store = OtpStore::new(300);
        let alice = Identity::new("alice@example.com");
        let code = store.issue(&alice);
        let wrong = if code == "000000" { "111111" } else { "000000" };

        for _ in 0..MAX_ATTEMPTS {
            assert_eq!(store.redeem(&alice, wrong), Err(OtpError::Mismatch));
        }
        assert_eq!(store.redeem(&alice, &code), Err(OtpError::Missing));
    }

    #[test]
    fn expired_code_is_rejected() {
        let store = OtpStore::new(300);
        let alice = Identity::new("alice@example.com");
        let code = store.issue(&alice);
        if let Ok(mut codes) = store.codes.lock() {
            if let Some(pending) = codes.get_mut(&alice) {
                pending.expires_at = Utc::now() - Duration::seconds(1);
            }
        }

        assert_eq!(store.redeem(&alice, &code), Err(OtpError::Expired));
        assert_eq!(store.redeem(&alice, &code), Err(OtpError::Missing));
    }
}
