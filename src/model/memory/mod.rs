//! In-memory implementations of every store, with hooks for driving time and
//! failures from tests. Also usable as a throwaway backend for local
//! development via `storage = "memory"`.

mod credentials;
mod records;

pub use credentials::MemoryCredentialStore;
pub use records::{
    MemoryAuditLog, MemoryElectionStore, MemoryProfileStore, MemoryUserStore, MemoryVoteStore,
};

use std::sync::Arc;

use crate::collaborators::{Collaborators, DigestLedger, FixedFaceOracle, MemoryNotifier};
use crate::model::store::Stores;

/// Score the fixed face oracle starts out with.
pub const DEFAULT_FACE_SCORE: f64 = 95.0;

/// A complete in-memory backend. Cloning shares the same state.
#[derive(Clone)]
pub struct MemoryBackend {
    pub credentials: Arc<MemoryCredentialStore>,
    pub users: Arc<MemoryUserStore>,
    pub profiles: Arc<MemoryProfileStore>,
    pub elections: Arc<MemoryElectionStore>,
    pub votes: Arc<MemoryVoteStore>,
    pub audit: Arc<MemoryAuditLog>,
    pub outbox: Arc<MemoryNotifier>,
    pub faces: Arc<FixedFaceOracle>,
    pub ledger: Arc<DigestLedger>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            credentials: Arc::new(MemoryCredentialStore::new()),
            users: Arc::default(),
            profiles: Arc::default(),
            elections: Arc::default(),
            votes: Arc::default(),
            audit: Arc::default(),
            outbox: Arc::new(MemoryNotifier::new()),
            faces: Arc::new(FixedFaceOracle::new(DEFAULT_FACE_SCORE)),
            ledger: Arc::new(DigestLedger),
        }
    }

    pub fn stores(&self) -> Stores {
        Stores {
            credentials: self.credentials.clone(),
            users: self.users.clone(),
            profiles: self.profiles.clone(),
            elections: self.elections.clone(),
            votes: self.votes.clone(),
            audit: self.audit.clone(),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            notifier: self.outbox.clone(),
            faces: Some(self.faces.clone()),
            ledger: self.ledger.clone(),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}
