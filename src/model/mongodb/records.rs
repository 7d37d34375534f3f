use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Database,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    common::{
        audit::AuditEntry,
        election::Election,
        profile::Profile,
        user::{NewUser, User},
        vote::{NewVote, Vote},
    },
    store::{AuditLog, ElectionStore, ProfileStore, UserStore, VoteStore},
};

use super::{is_duplicate_key_error, Coll, Id};

/// Turn a unique index violation into a [`Error::StorageConflict`].
fn map_conflict(err: DbError) -> Error {
    if is_duplicate_key_error(&err) {
        Error::StorageConflict
    } else {
        err.into()
    }
}

pub struct MongoUserStore(Coll<User>);

impl MongoUserStore {
    pub fn new(db: &Database) -> Self {
        Self(Coll::from_db(db))
    }
}

#[rocket::async_trait]
impl UserStore for MongoUserStore {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let user = User { id: Id::new(), user };
        self.0.insert_one(&user, None).await.map_err(map_conflict)?;
        Ok(user)
    }

    async fn by_id(&self, id: Id) -> Result<Option<User>> {
        Ok(self.0.find_one(id.as_doc(), None).await?)
    }

    async fn by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.0.find_one(doc! { "email": email }, None).await?)
    }

    async fn consume_verification_token(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let filter = doc! {
            "verification_token": digest,
            "verification_expire": { "$gt": BsonDateTime::from_chrono(now) },
        };
        let update = doc! {
            "$set": { "is_verified": true },
            "$unset": { "verification_token": "", "verification_expire": "" },
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self.0.find_one_and_update(filter, update, options).await?)
    }

    async fn clear_verification_token(&self, id: Id) -> Result<()> {
        let update = doc! {
            "$unset": { "verification_token": "", "verification_expire": "" },
        };
        self.0.update_one(id.as_doc(), update, None).await?;
        Ok(())
    }

    async fn set_reset_token(
        &self,
        id: Id,
        digest: &str,
        expire_at: DateTime<Utc>,
    ) -> Result<()> {
        let update = doc! {
            "$set": {
                "reset_token": digest,
                "reset_expire": BsonDateTime::from_chrono(expire_at),
            },
        };
        self.0.update_one(id.as_doc(), update, None).await?;
        Ok(())
    }

    async fn clear_reset_token(&self, id: Id) -> Result<()> {
        let update = doc! {
            "$unset": { "reset_token": "", "reset_expire": "" },
        };
        self.0.update_one(id.as_doc(), update, None).await?;
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        digest: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let filter = doc! {
            "reset_token": digest,
            "reset_expire": { "$gt": BsonDateTime::from_chrono(now) },
        };
        let update = doc! {
            "$set": { "password_hash": password_hash },
            "$unset": { "reset_token": "", "reset_expire": "" },
        };
        let user = self.0.find_one_and_update(filter, update, None).await?;
        Ok(user.is_some())
    }
}

pub struct MongoProfileStore(Coll<Profile>);

impl MongoProfileStore {
    pub fn new(db: &Database) -> Self {
        Self(Coll::from_db(db))
    }
}

#[rocket::async_trait]
impl ProfileStore for MongoProfileStore {
    async fn by_user(&self, user: Id) -> Result<Option<Profile>> {
        Ok(self.0.find_one(doc! { "user": user }, None).await?)
    }
}

pub struct MongoElectionStore(Coll<Election>);

impl MongoElectionStore {
    pub fn new(db: &Database) -> Self {
        Self(Coll::from_db(db))
    }
}

#[rocket::async_trait]
impl ElectionStore for MongoElectionStore {
    async fn by_id(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.0.find_one(id.as_doc(), None).await?)
    }
}

pub struct MongoVoteStore(Coll<Vote>);

impl MongoVoteStore {
    pub fn new(db: &Database) -> Self {
        Self(Coll::from_db(db))
    }
}

#[rocket::async_trait]
impl VoteStore for MongoVoteStore {
    async fn exists(&self, election: Id, voter: Id) -> Result<bool> {
        let filter = doc! { "election": election, "voter": voter };
        let count = self.0.count_documents(filter, None).await?;
        Ok(count > 0)
    }

    async fn insert(&self, vote: NewVote) -> Result<Vote> {
        let vote = Vote { id: Id::new(), vote };
        self.0.insert_one(&vote, None).await.map_err(map_conflict)?;
        Ok(vote)
    }

    async fn attach_attestation(&self, id: Id, attestation: &str) -> Result<()> {
        let filter = doc! { "_id": id, "attestation": null };
        let update = doc! { "$set": { "attestation": attestation } };
        self.0.update_one(filter, update, None).await?;
        Ok(())
    }

    async fn unattested(&self, limit: i64) -> Result<Vec<Vote>> {
        let oldest_first = FindOptions::builder()
            .sort(doc! { "timestamp": 1 })
            .limit(limit)
            .build();
        let votes: Vec<Vote> = self
            .0
            .find(doc! { "attestation": null }, oldest_first)
            .await?
            .try_collect()
            .await?;
        Ok(votes)
    }

    async fn by_voter(&self, voter: Id) -> Result<Vec<Vote>> {
        let newest_first = FindOptions::builder()
            .sort(doc! { "timestamp": -1 })
            .build();
        let votes: Vec<Vote> = self
            .0
            .find(doc! { "voter": voter }, newest_first)
            .await?
            .try_collect()
            .await?;
        Ok(votes)
    }
}

pub struct MongoAuditLog(Coll<AuditEntry>);

impl MongoAuditLog {
    pub fn new(db: &Database) -> Self {
        Self(Coll::from_db(db))
    }
}

#[rocket::async_trait]
impl AuditLog for MongoAuditLog {
    async fn append(&self, entry: AuditEntry) -> Result<()> {
        self.0.insert_one(&entry, None).await?;
        Ok(())
    }
}
