use chrono::{DateTime, Duration, Utc};
use mongodb::{
    bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime, DateTime as BsonDateTime, Document},
    options::{FindOneAndUpdateOptions, ReplaceOptions, ReturnDocument},
    Database,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::credentials::CredentialStore;

use super::Coll;

/// One credential, as stored in the database.
#[derive(Debug, Serialize, Deserialize)]
pub struct CredentialEntry {
    #[serde(rename = "_id")]
    pub key: String,
    pub value: String,
    /// Only meaningful for counters.
    #[serde(default)]
    pub count: i64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub expire_at: DateTime<Utc>,
}

/// Credential store backed by a TTL-indexed collection.
///
/// The TTL monitor only runs about once a minute, so every read also filters
/// on `expire_at` itself.
pub struct MongoCredentialStore {
    db: Database,
    entries: Coll<CredentialEntry>,
}

impl MongoCredentialStore {
    pub fn new(db: &Database) -> Self {
        Self {
            db: db.clone(),
            entries: Coll::from_db(db),
        }
    }

    fn live(key: &str) -> Document {
        doc! {
            "_id": key,
            "expire_at": { "$gt": BsonDateTime::from_chrono(Utc::now()) },
        }
    }
}

#[rocket::async_trait]
impl CredentialStore for MongoCredentialStore {
    async fn ping(&self) -> Result<()> {
        self.db
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let entry = CredentialEntry {
            key: key.to_string(),
            value: value.to_string(),
            count: 0,
            expire_at: Utc::now() + ttl,
        };
        let upsert = ReplaceOptions::builder().upsert(true).build();
        self.entries
            .replace_one(doc! { "_id": key }, entry, upsert)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entry = self.entries.find_one(Self::live(key), None).await?;
        Ok(entry.map(|entry| entry.value))
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        let entry = self
            .entries
            .find_one_and_delete(Self::live(key), None)
            .await?;
        Ok(entry.map(|entry| entry.value))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.delete_one(doc! { "_id": key }, None).await?;
        Ok(())
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u32> {
        let now = Utc::now();
        // An expired counter the TTL monitor has not reaped yet starts over.
        self.entries
            .delete_one(
                doc! { "_id": key, "expire_at": { "$lte": BsonDateTime::from_chrono(now) } },
                None,
            )
            .await?;

        let update = doc! {
            "$inc": { "count": 1_i64 },
            "$setOnInsert": {
                "value": "",
                "expire_at": BsonDateTime::from_chrono(now + ttl),
            },
        };
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        let entry = self
            .entries
            .find_one_and_update(doc! { "_id": key }, update, options)
            .await?
            .ok_or_else(|| Error::Internal(format!("upsert of counter {key} returned nothing")))?;
        Ok(u32::try_from(entry.count).unwrap_or(u32::MAX))
    }
}
