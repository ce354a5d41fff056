//! Error taxonomy for authentication attempts.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("identity already registered")]
    IdentityExists,
    #[error("credential hashing failed: {0}")]
    Hashing(String),
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Expected, user-facing failures of an attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Unknown identity")]
    IdentityUnknown,
    #[error("Login blocked due to high risk activity (score {score})")]
    RiskBlocked { score: u8 },
    #[error("Attempt history unavailable: {0}")]
    LedgerUnavailable(String),
    #[error("Credential directory unavailable: {0}")]
    DirectoryUnavailable(String),
}

impl From<LedgerError> for AuthError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Unavailable(reason) => Self::LedgerUnavailable(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_message_discloses_score() {
        let err = AuthError::RiskBlocked { score: 87 };
        assert!(err.to_string().contains("87"));
    }

    #[test]
    fn ledger_error_maps_to_unavailable() {
        let err: AuthError = LedgerError::Unavailable("poisoned".to_string()).into();
        assert_eq!(err, AuthError::LedgerUnavailable("poisoned".to_string()));
    }
}
