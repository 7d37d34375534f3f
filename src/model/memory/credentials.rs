use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};

use crate::error::{Error, Result};
use crate::model::credentials::CredentialStore;

/// Credential store held in process memory.
///
/// Its clock can be moved forward to expire entries without waiting, and the
/// whole store can be taken offline.
#[derive(Debug)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
    skew: Mutex<Duration>,
    available: AtomicBool,
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self {
            entries: Mutex::default(),
            skew: Mutex::new(Duration::zero()),
            available: AtomicBool::new(true),
        }
    }
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move this store's clock forward.
    pub fn advance(&self, by: Duration) {
        let mut skew = self.skew.lock().unwrap_or_else(PoisonError::into_inner);
        *skew = *skew + by;
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = self.now();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|(_, expire_at)| *expire_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries held, live or not.
    #[cfg(test)]
    fn held(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now() + *self.skew.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::StoreUnavailable("store is offline".to_string()))
        }
    }
}

#[rocket::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn ping(&self) -> Result<()> {
        self.check_available()
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.check_available()?;
        let now = self.now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        // Nothing else reaps expired entries.
        entries.retain(|_, (_, expire_at)| *expire_at > now);
        entries.insert(key.to_string(), (value.to_string(), now + ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        let now = self.now();
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .get(key)
            .filter(|(_, expire_at)| *expire_at > now)
            .map(|(value, _)| value.clone()))
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        let now = self.now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .remove(key)
            .filter(|(_, expire_at)| *expire_at > now)
            .map(|(value, _)| value))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check_available()?;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u32> {
        self.check_available()?;
        let now = self.now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let live = entries
            .get(key)
            .filter(|(_, expire_at)| *expire_at > now)
            .cloned();
        let (count, expire_at) = match live {
            Some((count, expire_at)) => {
                let count: u32 = count
                    .parse()
                    .map_err(|_| Error::Internal(format!("entry {key} is not a counter")))?;
                (count.saturating_add(1), expire_at)
            }
            None => (1, now + ttl),
        };
        entries.insert(key.to_string(), (count.to_string(), expire_at));
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[rocket::async_test]
    async fn entries_expire() {
        let store = MemoryCredentialStore::new();
        store.put("k", "v", Duration::seconds(120)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        store.advance(Duration::seconds(119));
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        store.advance(Duration::seconds(1));
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.take("k").await.unwrap(), None);
    }

    #[rocket::async_test]
    async fn take_is_one_shot() {
        let store = MemoryCredentialStore::new();
        store.put("k", "v", Duration::seconds(60)).await.unwrap();
        assert_eq!(store.take("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.take("k").await.unwrap(), None);
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[rocket::async_test]
    async fn concurrent_takes_have_one_winner() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.put("k", "v", Duration::seconds(60)).await.unwrap();

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                rocket::tokio::spawn(async move { store.take("k").await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[rocket::async_test]
    async fn put_replaces() {
        let store = MemoryCredentialStore::new();
        store.put("k", "old", Duration::seconds(60)).await.unwrap();
        store.put("k", "new", Duration::seconds(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("new"));
        assert_eq!(store.len(), 1);
    }

    #[rocket::async_test]
    async fn put_evicts_expired_entries() {
        let store = MemoryCredentialStore::new();
        store.put("abandoned", "v", Duration::seconds(60)).await.unwrap();
        store.put("live", "v", Duration::seconds(600)).await.unwrap();
        store.advance(Duration::seconds(61));

        store.put("fresh", "v", Duration::seconds(60)).await.unwrap();
        assert_eq!(store.held(), 2);
        assert_eq!(store.get("live").await.unwrap().as_deref(), Some("v"));
    }

    #[rocket::async_test]
    async fn counters_count_until_they_expire() {
        let store = MemoryCredentialStore::new();
        for expected in 1..=3 {
            let count = store.increment("c", Duration::seconds(60)).await.unwrap();
            assert_eq!(count, expected);
        }

        // Incrementing does not push the expiry back.
        store.advance(Duration::seconds(61));
        assert_eq!(store.increment("c", Duration::seconds(60)).await.unwrap(), 1);
    }

    #[rocket::async_test]
    async fn concurrent_increments_are_all_counted() {
        let store = Arc::new(MemoryCredentialStore::new());
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                rocket::tokio::spawn(async move {
                    store.increment("c", Duration::seconds(60)).await.unwrap()
                })
            })
            .collect();

        let mut counts = Vec::new();
        for task in tasks {
            counts.push(task.await.unwrap());
        }
        counts.sort_unstable();
        assert_eq!(counts, (1..=16).collect::<Vec<u32>>());
    }

    #[rocket::async_test]
    async fn offline_store_fails_fast() {
        let store = MemoryCredentialStore::new();
        store.set_available(false);
        assert!(matches!(store.ping().await, Err(Error::StoreUnavailable(_))));
        assert!(matches!(
            store.put("k", "v", Duration::seconds(60)).await,
            Err(Error::StoreUnavailable(_))
        ));
    }
}
