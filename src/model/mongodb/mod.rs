mod bson;
mod collection;
mod credentials;
mod errors;
mod records;

pub use bson::Id;
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use credentials::{CredentialEntry, MongoCredentialStore};
pub use errors::{is_duplicate_key_error, DUPLICATE_KEY};
pub use records::{
    MongoAuditLog, MongoElectionStore, MongoProfileStore, MongoUserStore, MongoVoteStore,
};

use std::sync::Arc;

use mongodb::Database;

use crate::model::store::Stores;

/// Every store, backed by the given database.
pub fn stores(db: &Database) -> Stores {
    Stores {
        credentials: Arc::new(MongoCredentialStore::new(db)),
        users: Arc::new(MongoUserStore::new(db)),
        profiles: Arc::new(MongoProfileStore::new(db)),
        elections: Arc::new(MongoElectionStore::new(db)),
        votes: Arc::new(MongoVoteStore::new(db)),
        audit: Arc::new(MongoAuditLog::new(db)),
    }
}
