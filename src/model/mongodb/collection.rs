use std::ops::Deref;
use std::time::Duration;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::common::{
    audit::AuditEntry, election::Election, profile::Profile, user::User, vote::Vote,
};

use super::credentials::CredentialEntry;

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MongoCollection for User {
    const NAME: &'static str = "users";
}

impl MongoCollection for Profile {
    const NAME: &'static str = "profiles";
}

impl MongoCollection for Election {
    const NAME: &'static str = "elections";
}

impl MongoCollection for Vote {
    const NAME: &'static str = "votes";
}

impl MongoCollection for AuditEntry {
    const NAME: &'static str = "audit_log";
}

impl MongoCollection for CredentialEntry {
    const NAME: &'static str = "credentials";
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // User collection.
    let email_index = IndexModel::builder()
        .keys(doc! {"email": 1})
        .options(unique.clone())
        .build();
    Coll::<User>::from_db(db)
        .create_index(email_index, None)
        .await?;

    // Profile collection.
    let profile_user_index = IndexModel::builder()
        .keys(doc! {"user": 1})
        .options(unique.clone())
        .build();
    let voter_id_index = IndexModel::builder()
        .keys(doc! {"voter_id": 1})
        .options(unique.clone())
        .build();
    Coll::<Profile>::from_db(db)
        .create_indexes([profile_user_index, voter_id_index], None)
        .await?;

    // Vote collection: the authoritative one-vote-per-voter guarantee.
    let vote_index = IndexModel::builder()
        .keys(doc! {"election": 1, "voter": 1})
        .options(unique)
        .build();
    Coll::<Vote>::from_db(db)
        .create_index(vote_index, None)
        .await?;

    // Credential collection: MongoDB reaps expired entries in the background.
    let ttl_index = IndexModel::builder()
        .keys(doc! {"expire_at": 1})
        .options(
            IndexOptions::builder()
                .expire_after(Duration::from_secs(0))
                .build(),
        )
        .build();
    Coll::<CredentialEntry>::from_db(db)
        .create_index(ttl_index, None)
        .await?;

    Ok(())
}
