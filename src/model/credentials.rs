//! The credential store: short-lived key/value entries with per-entry expiry.
//!
//! Holds MFA challenges and voting tokens. An expired entry and a missing
//! entry are the same thing to every caller.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{api::ApiId, mongodb::Id};

#[rocket::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Check the store is reachable. Operations that depend on TTL-bearing
    /// entries call this first and fail fast instead of silently skipping.
    async fn ping(&self) -> Result<()>;

    /// Store `value` under `key` for `ttl`, replacing any previous entry.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Read a live entry.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Atomically read and delete a live entry. Of any number of concurrent
    /// callers, at most one observes the value.
    async fn take(&self, key: &str) -> Result<Option<String>>;

    /// Delete an entry whether or not it is live.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Atomically add one to the counter under `key` and return the new
    /// count. A missing or expired counter starts again from one and lives
    /// for `ttl`; later increments do not extend it.
    ///
    /// Counters share the key space with other entries but are only ever read
    /// through this method.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u32>;
}

/// Key of the entry mapping an MFA session token to its user.
pub fn mfa_session_key(token: &str) -> String {
    format!("mfa:{token}")
}

/// Key of the entry holding the code a user is expected to submit.
pub fn mfa_code_key(user: Id) -> String {
    format!("code:{user}")
}

/// Key of the counter of a user's code submissions against their current
/// challenge.
pub fn mfa_attempts_key(user: Id) -> String {
    format!("attempts:{user}")
}

/// Key of the entry holding a voting token's grant.
pub fn voting_token_key(token: &str) -> String {
    format!("vote:{token}")
}

/// What a voting token entitles its bearer to: one vote, by one user, in one
/// election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingGrant {
    pub user_id: ApiId,
    pub election_id: ApiId,
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json;

    use super::*;

    #[test]
    fn keys_are_namespaced() {
        let user = Id::new();
        assert_eq!(mfa_session_key("abc"), "mfa:abc");
        assert_eq!(mfa_code_key(user), format!("code:{user}"));
        assert_eq!(voting_token_key("abc"), "vote:abc");
        assert_eq!(mfa_attempts_key(user), format!("attempts:{user}"));
    }

    #[test]
    fn grant_is_plain_json() {
        let grant = VotingGrant {
            user_id: Id::new().into(),
            election_id: Id::new().into(),
        };
        let json = serde_json::to_string(&grant).unwrap();
        assert!(json.contains(&format!("\"userId\":\"{}\"", grant.user_id)));
        let back: VotingGrant = serde_json::from_str(&json).unwrap();
        assert_eq!(back, grant);
    }
}
