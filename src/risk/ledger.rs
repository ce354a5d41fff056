//! Append-only, per-identity attempt history.
//!
//! Flow Overview:
//! 1) The orchestrator calls [`Ledger::append_with`] for an identity.
//! 2) The ledger takes that identity's exclusive lock, hands the closure a
//!    read-only view of the history, and appends the entry the closure returns.
//! 3) The lock is released; the appended entry is returned with its id.
//!
//! Appends for different identities use different locks and never wait on each
//! other. Entries are never updated or removed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, error};

use super::error::LedgerError;
use super::types::{EntryId, Identity, LedgerEntry, PendingEntry};

/// Evaluation run inside an identity's critical section.
pub type Evaluate<'a> = dyn FnMut(&[LedgerEntry]) -> PendingEntry + 'a;

pub trait Ledger: Send + Sync {
    /// Snapshot the identity's history, evaluate it and append the result, with
    /// no other append for the same identity interleaving.
    ///
    /// # Errors
    /// Returns `LedgerError::Unavailable` if the history cannot be read or the
    /// entry cannot be persisted; in that case nothing is appended.
    fn append_with(
        &self,
        identity: &Identity,
        evaluate: &mut Evaluate<'_>,
    ) -> Result<LedgerEntry, LedgerError>;

    /// Entries for an identity in insertion order.
    ///
    /// # Errors
    /// Returns `LedgerError::Unavailable` if the history cannot be read.
    fn entries(&self, identity: &Identity) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// Whether the ledger can currently serve reads and appends.
    fn is_available(&self) -> bool {
        true
    }
}

type Partition = Arc<Mutex<Vec<LedgerEntry>>>;

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    last_id: AtomicU64,
    partitions: RwLock<HashMap<Identity, Partition>>,
}

impl InMemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries across all identities.
    #[must_use]
    pub fn count(&self) -> usize {
        let Ok(partitions) = self.partitions.read() else {
            return 0;
        };
        partitions
            .values()
            .filter_map(|partition| partition.lock().ok().map(|entries| entries.len()))
            .sum()
    }

    fn existing(&self, identity: &Identity) -> Result<Option<Partition>, LedgerError> {
        let partitions = self
            .partitions
            .read()
            .map_err(|_| poisoned("partition index"))?;
        Ok(partitions.get(identity).cloned())
    }

    fn partition(&self, identity: &Identity) -> Result<Partition, LedgerError> {
        if let Some(partition) = self.existing(identity)? {
            return Ok(partition);
        }

        let mut partitions = self
            .partitions
            .write()
            .map_err(|_| poisoned("partition index"))?;
        Ok(partitions.entry(identity.clone()).or_default().clone())
    }
}

impl Ledger for InMemoryLedger {
    fn append_with(
        &self,
        identity: &Identity,
        evaluate: &mut Evaluate<'_>,
    ) -> Result<LedgerEntry, LedgerError> {
        let partition = self.partition(identity)?;
        let mut entries = partition.lock().map_err(|_| poisoned(identity.as_str()))?;

        let pending = evaluate(&entries);
        if pending.attributes.identity != *identity {
            error!(
                identity = %identity,
                attempt_identity = %pending.attributes.identity,
                "refusing to append an entry under a different identity"
            );
            return Err(LedgerError::Unavailable(
                "entry identity does not match partition".to_string(),
            ));
        }

        let id = EntryId::new(self.last_id.fetch_add(1, Ordering::SeqCst) + 1);
        let entry = LedgerEntry::from_pending(id, pending);
        entries.push(entry.clone());

        debug!(identity = %identity, entry_id = %id, length = entries.len(), "ledger append");

        Ok(entry)
    }

    fn entries(&self, identity: &Identity) -> Result<Vec<LedgerEntry>, LedgerError> {
        let Some(partition) = self.existing(identity)? else {
            return Ok(Vec::new());
        };
        let entries = partition.lock().map_err(|_| poisoned(identity.as_str()))?;
        Ok(entries.clone())
    }

    fn is_available(&self) -> bool {
        self.partitions.read().is_ok()
    }
}

fn poisoned(what: &str) -> LedgerError {
    error!("ledger lock poisoned: {what}");
    LedgerError::Unavailable(format!("lock poisoned: {what}"))
}
