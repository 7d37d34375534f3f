use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use mongodb::bson::DateTime as BsonDateTime;

use crate::error::{Error, Result};
use crate::model::{
    common::{
        audit::AuditEntry,
        election::{Election, NewElection},
        profile::{NewProfile, Profile},
        user::{NewUser, User},
        vote::{NewVote, Vote},
    },
    mongodb::Id,
    store::{AuditLog, ElectionStore, ProfileStore, UserStore, VoteStore},
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unexpired(expire_at: Option<BsonDateTime>, now: DateTime<Utc>) -> bool {
    expire_at.map_or(false, |expire_at| expire_at.to_chrono() > now)
}

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Id, User>>,
}

impl MemoryUserStore {
    /// Overwrite a stored user, e.g. to age a token in a test.
    pub fn replace(&self, user: User) {
        lock(&self.users).insert(user.id, user);
    }
}

#[rocket::async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let mut users = lock(&self.users);
        if users.values().any(|existing| existing.email == user.email) {
            return Err(Error::StorageConflict);
        }
        let user = User { id: Id::new(), user };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn by_id(&self, id: Id) -> Result<Option<User>> {
        Ok(lock(&self.users).get(&id).cloned())
    }

    async fn by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(lock(&self.users)
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn consume_verification_token(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let mut users = lock(&self.users);
        let user = users.values_mut().find(|user| {
            user.verification_token.as_deref() == Some(digest)
                && unexpired(user.verification_expire, now)
        });
        Ok(user.map(|user| {
            user.is_verified = true;
            user.verification_token = None;
            user.verification_expire = None;
            user.clone()
        }))
    }

    async fn clear_verification_token(&self, id: Id) -> Result<()> {
        if let Some(user) = lock(&self.users).get_mut(&id) {
            user.verification_token = None;
            user.verification_expire = None;
        }
        Ok(())
    }

    async fn set_reset_token(
        &self,
        id: Id,
        digest: &str,
        expire_at: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(user) = lock(&self.users).get_mut(&id) {
            user.reset_token = Some(digest.to_string());
            user.reset_expire = Some(BsonDateTime::from_chrono(expire_at));
        }
        Ok(())
    }

    async fn clear_reset_token(&self, id: Id) -> Result<()> {
        if let Some(user) = lock(&self.users).get_mut(&id) {
            user.reset_token = None;
            user.reset_expire = None;
        }
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        digest: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut users = lock(&self.users);
        let user = users.values_mut().find(|user| {
            user.reset_token.as_deref() == Some(digest) && unexpired(user.reset_expire, now)
        });
        Ok(user
            .map(|user| {
                user.password_hash = password_hash.to_string();
                user.reset_token = None;
                user.reset_expire = None;
            })
            .is_some())
    }
}

#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: Mutex<Vec<Profile>>,
}

impl MemoryProfileStore {
    pub fn insert(&self, profile: NewProfile) -> Result<Profile> {
        let mut profiles = lock(&self.profiles);
        if profiles
            .iter()
            .any(|p| p.user == profile.user || p.voter_id == profile.voter_id)
        {
            return Err(Error::StorageConflict);
        }
        let profile = Profile {
            id: Id::new(),
            profile,
        };
        profiles.push(profile.clone());
        Ok(profile)
    }
}

#[rocket::async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn by_user(&self, user: Id) -> Result<Option<Profile>> {
        Ok(lock(&self.profiles)
            .iter()
            .find(|profile| profile.user == user)
            .cloned())
    }
}

#[derive(Debug, Default)]
pub struct MemoryElectionStore {
    elections: Mutex<HashMap<Id, Election>>,
}

impl MemoryElectionStore {
    pub fn insert(&self, election: NewElection) -> Election {
        let election = Election {
            id: Id::new(),
            election,
        };
        lock(&self.elections).insert(election.id, election.clone());
        election
    }
}

#[rocket::async_trait]
impl ElectionStore for MemoryElectionStore {
    async fn by_id(&self, id: Id) -> Result<Option<Election>> {
        Ok(lock(&self.elections).get(&id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct MemoryVoteStore {
    votes: Mutex<Vec<Vote>>,
}

impl MemoryVoteStore {
    /// Every stored vote.
    pub fn all(&self) -> Vec<Vote> {
        lock(&self.votes).clone()
    }
}

#[rocket::async_trait]
impl VoteStore for MemoryVoteStore {
    async fn exists(&self, election: Id, voter: Id) -> Result<bool> {
        Ok(lock(&self.votes)
            .iter()
            .any(|vote| vote.election == election && vote.voter == voter))
    }

    async fn insert(&self, vote: NewVote) -> Result<Vote> {
        // Checked under the same lock as the push.
        let mut votes = lock(&self.votes);
        if votes
            .iter()
            .any(|v| v.election == vote.election && v.voter == vote.voter)
        {
            return Err(Error::StorageConflict);
        }
        let vote = Vote { id: Id::new(), vote };
        votes.push(vote.clone());
        Ok(vote)
    }

    async fn attach_attestation(&self, id: Id, attestation: &str) -> Result<()> {
        if let Some(vote) = lock(&self.votes)
            .iter_mut()
            .find(|vote| vote.id == id && vote.attestation.is_none())
        {
            vote.attestation = Some(attestation.to_string());
        }
        Ok(())
    }

    async fn unattested(&self, limit: i64) -> Result<Vec<Vote>> {
        let mut votes: Vec<Vote> = lock(&self.votes)
            .iter()
            .filter(|vote| vote.attestation.is_none())
            .cloned()
            .collect();
        votes.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        votes.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(votes)
    }

    async fn by_voter(&self, voter: Id) -> Result<Vec<Vote>> {
        let mut votes: Vec<Vote> = lock(&self.votes)
            .iter()
            .filter(|vote| vote.voter == voter)
            .cloned()
            .collect();
        votes.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(votes)
    }
}

#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
    failing: AtomicBool,
}

impl MemoryAuditLog {
    pub fn entries(&self) -> Vec<AuditEntry> {
        lock(&self.entries).clone()
    }

    /// Make every subsequent append fail, or succeed again.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[rocket::async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(&self, entry: AuditEntry) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Internal("audit log is failing".to_string()));
        }
        lock(&self.entries).push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::model::common::{
        token::digest_token,
        vote::Location,
    };

    use super::*;

    fn vote(election: Id, voter: Id) -> NewVote {
        NewVote {
            election,
            voter,
            candidate: Id::new(),
            timestamp: Utc::now(),
            location: Location::default(),
            facial_verification: None,
            attestation: None,
            is_anonymous: true,
        }
    }

    #[rocket::async_test]
    async fn duplicate_email_conflicts() {
        let users = MemoryUserStore::default();
        users.insert(NewUser::example()).await.unwrap();
        let result = users.insert(NewUser::example()).await;
        assert!(matches!(result, Err(Error::StorageConflict)));
    }

    #[rocket::async_test]
    async fn duplicate_vote_conflicts() {
        let votes = MemoryVoteStore::default();
        let (election, voter) = (Id::new(), Id::new());
        votes.insert(vote(election, voter)).await.unwrap();
        assert!(votes.exists(election, voter).await.unwrap());

        let result = votes.insert(vote(election, voter)).await;
        assert!(matches!(result, Err(Error::StorageConflict)));

        // Another election is fine.
        votes.insert(vote(Id::new(), voter)).await.unwrap();
        assert_eq!(votes.by_voter(voter).await.unwrap().len(), 2);
    }

    #[rocket::async_test]
    async fn verification_token_is_consumed_once() {
        let users = MemoryUserStore::default();
        let mut new_user = NewUser::example_unverified();
        new_user.verification_token = Some(digest_token("t"));
        new_user.verification_expire =
            Some(BsonDateTime::from_chrono(Utc::now() + Duration::hours(1)));
        users.insert(new_user).await.unwrap();

        let verified = users
            .consume_verification_token(&digest_token("t"), Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert!(verified.is_verified);
        assert!(verified.verification_token.is_none());

        let again = users
            .consume_verification_token(&digest_token("t"), Utc::now())
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[rocket::async_test]
    async fn expired_reset_token_is_refused() {
        let users = MemoryUserStore::default();
        let user = users.insert(NewUser::example()).await.unwrap();
        users
            .set_reset_token(user.id, &digest_token("r"), Utc::now() - Duration::minutes(1))
            .await
            .unwrap();

        let consumed = users
            .consume_reset_token(&digest_token("r"), "hash", Utc::now())
            .await
            .unwrap();
        assert!(!consumed);
        let unchanged = users.by_id(user.id).await.unwrap().unwrap();
        assert_eq!(unchanged.password_hash, user.password_hash);
    }
}
