//! Durable record storage.
//!
//! Every store has a MongoDB implementation for production
//! ([`crate::model::mongodb`]) and an in-memory one for tests and local
//! development ([`crate::model::memory`]).

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{
    common::{
        audit::AuditEntry,
        election::Election,
        profile::Profile,
        user::{NewUser, User},
        vote::{NewVote, Vote},
    },
    credentials::CredentialStore,
    mongodb::Id,
};

#[rocket::async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. Fails with `StorageConflict` if the email is taken.
    async fn insert(&self, user: NewUser) -> Result<User>;

    async fn by_id(&self, id: Id) -> Result<Option<User>>;

    async fn by_email(&self, email: &str) -> Result<Option<User>>;

    /// Atomically mark the owner of an unexpired verification token digest as
    /// verified and clear the token. Returns the updated user, if any matched.
    async fn consume_verification_token(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>>;

    async fn clear_verification_token(&self, id: Id) -> Result<()>;

    async fn set_reset_token(&self, id: Id, digest: &str, expire_at: DateTime<Utc>)
        -> Result<()>;

    async fn clear_reset_token(&self, id: Id) -> Result<()>;

    /// Atomically replace the password of the owner of an unexpired reset
    /// token digest and clear the token. Returns whether any user matched.
    async fn consume_reset_token(
        &self,
        digest: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool>;
}

#[rocket::async_trait]
pub trait ProfileStore: Send + Sync {
    async fn by_user(&self, user: Id) -> Result<Option<Profile>>;
}

#[rocket::async_trait]
pub trait ElectionStore: Send + Sync {
    async fn by_id(&self, id: Id) -> Result<Option<Election>>;
}

#[rocket::async_trait]
pub trait VoteStore: Send + Sync {
    /// Advisory check. The unique constraint enforced by [`VoteStore::insert`]
    /// is what actually keeps a voter to one vote.
    async fn exists(&self, election: Id, voter: Id) -> Result<bool>;

    /// Insert a vote. A second vote for the same `(election, voter)` fails
    /// with `StorageConflict`, however close together the two arrive.
    async fn insert(&self, vote: NewVote) -> Result<Vote>;

    /// Attach a ledger reference to a vote that has none yet. A vote that is
    /// already attested keeps its reference.
    async fn attach_attestation(&self, id: Id, attestation: &str) -> Result<()>;

    /// Up to `limit` votes still waiting for an attestation, oldest first.
    async fn unattested(&self, limit: i64) -> Result<Vec<Vote>>;

    async fn by_voter(&self, voter: Id) -> Result<Vec<Vote>>;
}

/// The append-only audit trail.
#[rocket::async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<()>;
}

/// Every store the backend uses, placed into managed state.
#[derive(Clone)]
pub struct Stores {
    pub credentials: Arc<dyn CredentialStore>,
    pub users: Arc<dyn UserStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub elections: Arc<dyn ElectionStore>,
    pub votes: Arc<dyn VoteStore>,
    pub audit: Arc<dyn AuditLog>,
}
