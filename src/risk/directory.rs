//! Credential directory contract and an in-memory, argon2-backed implementation.
//!
//! The core only asks whether a secret matches an identity. How credentials are
//! hashed and where they live belongs to the directory.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, error};

use super::error::DirectoryError;
use super::types::Identity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Matched(Identity),
    Mismatch,
    /// Only reported by directories that distinguish unknown identities.
    Unknown,
}

pub trait CredentialDirectory: Send + Sync {
    /// Check `secret` against the identity's stored credential.
    ///
    /// # Errors
    /// Returns `DirectoryError::Unavailable` if the directory cannot be queried.
    fn verify(
        &self,
        identity: &Identity,
        secret: &SecretString,
    ) -> Result<Verification, DirectoryError>;

    /// Store a credential for a new identity.
    ///
    /// # Errors
    /// Returns `DirectoryError::IdentityExists` for duplicates, or a hashing /
    /// availability error.
    fn register(
        &self,
        identity: &Identity,
        display_name: &str,
        secret: &SecretString,
    ) -> Result<(), DirectoryError>;

    /// # Errors
    /// Returns `DirectoryError::Unavailable` if the directory cannot be queried.
    fn contains(&self, identity: &Identity) -> Result<bool, DirectoryError>;

    /// # Errors
    /// Returns `DirectoryError::Unavailable` if the directory cannot be queried.
    fn display_name(&self, identity: &Identity) -> Result<Option<String>, DirectoryError>;
}

#[derive(Debug, Clone)]
struct Account {
    display_name: String,
    password_hash: String,
}

#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    accounts: RwLock<HashMap<Identity, Account>>,
    distinguish_unknown: bool,
}

impl InMemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report unknown identities as [`Verification::Unknown`] instead of
    /// folding them into [`Verification::Mismatch`].
    #[must_use]
    pub fn with_distinguish_unknown(mut self, distinguish: bool) -> Self {
        self.distinguish_unknown = distinguish;
        self
    }

    fn hash(secret: &SecretString) -> Result<String, DirectoryError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(secret.expose_secret().as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| DirectoryError::Hashing(err.to_string()))
    }
}

impl CredentialDirectory for InMemoryDirectory {
    fn verify(
        &self,
        identity: &Identity,
        secret: &SecretString,
    ) -> Result<Verification, DirectoryError> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| DirectoryError::Unavailable("lock poisoned".to_string()))?;

        let Some(account) = accounts.get(identity) else {
            debug!(identity = %identity, "no account for identity");
            return Ok(if self.distinguish_unknown {
                Verification::Unknown
            } else {
                Verification::Mismatch
            });
        };

        let parsed = match PasswordHash::new(&account.password_hash) {
            Ok(parsed) => parsed,
            Err(err) => {
                error!(identity = %identity, "stored password hash is malformed: {err}");
                return Ok(Verification::Mismatch);
            }
        };

        match Argon2::default().verify_password(secret.expose_secret().as_bytes(), &parsed) {
            Ok(()) => Ok(Verification::Matched(identity.clone())),
            Err(_) => Ok(Verification::Mismatch),
        }
    }

    fn register(
        &self,
        identity: &Identity,
        display_name: &str,
        secret: &SecretString,
    ) -> Result<(), DirectoryError> {
        if self.contains(identity)? {
            return Err(DirectoryError::IdentityExists);
        }

        let password_hash = Self::hash(secret)?;

        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| DirectoryError::Unavailable("lock poisoned".to_string()))?;
        if accounts.contains_key(identity) {
            return Err(DirectoryError::IdentityExists);
        }
        accounts.insert(
            identity.clone(),
            Account {
                display_name: display_name.to_string(),
                password_hash,
            },
        );
        Ok(())
    }

    fn contains(&self, identity: &Identity) -> Result<bool, DirectoryError> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| DirectoryError::Unavailable("lock poisoned".to_string()))?;
        Ok(accounts.contains_key(identity))
    }

    fn display_name(&self, identity: &Identity) -> Result<Option<String>, DirectoryError> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| DirectoryError::Unavailable("lock poisoned".to_string()))?;
        Ok(accounts
            .get(identity)
            .map(|account| account.display_name.clone()))
    }
}
