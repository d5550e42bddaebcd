//! In-process record store.

use super::{Fields, Record, RecordStore, SetMode, StoreError, StoreFuture, merge_fields};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tokio::sync::RwLock;

type Key = (String, String);

/// `HashMap`-backed store with the same versioning rules as [`super::PgStore`].
///
/// `set_unavailable(true)` makes every call fail with
/// [`StoreError::Unavailable`], which lets tests exercise outage handling.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<Key, Record>>,
    last_version: AtomicI64,
    unavailable: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of records in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.records
            .read()
            .await
            .keys()
            .filter(|(c, _)| c == collection)
            .count()
    }

    fn next_version(&self) -> i64 {
        self.last_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store offline".to_string()))
        } else {
            Ok(())
        }
    }
}

fn key(collection: &str, id: &str) -> Key {
    (collection.to_string(), id.to_string())
}

impl RecordStore for MemoryStore {
    fn get<'a>(&'a self, collection: &'a str, id: &'a str) -> StoreFuture<'a, Option<Record>> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.records.read().await.get(&key(collection, id)).cloned())
        })
    }

    fn set<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        fields: Fields,
        mode: SetMode,
    ) -> StoreFuture<'a, i64> {
        Box::pin(async move {
            self.check_available()?;
            let mut records = self.records.write().await;
            let record = match records.remove(&key(collection, id)) {
                Some(mut existing) => {
                    match mode {
                        SetMode::Overwrite => existing.fields = fields,
                        SetMode::Merge => merge_fields(&mut existing.fields, fields),
                    }
                    existing.version = self.next_version();
                    existing
                }
                None => Record {
                    fields,
                    version: self.next_version(),
                },
            };
            let version = record.version;
            records.insert(key(collection, id), record);
            Ok(version)
        })
    }

    fn update<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        fields: Fields,
        expected_version: Option<i64>,
    ) -> StoreFuture<'a, i64> {
        Box::pin(async move {
            self.check_available()?;
            let mut records = self.records.write().await;
            let record = records
                .get_mut(&key(collection, id))
                .ok_or_else(|| StoreError::not_found(collection, id))?;
            if expected_version.is_some_and(|expected| expected != record.version) {
                return Err(StoreError::conflict(collection, id));
            }
            merge_fields(&mut record.fields, fields);
            record.version = self.next_version();
            Ok(record.version)
        })
    }

    fn delete<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        expected_version: Option<i64>,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            self.check_available()?;
            let mut records = self.records.write().await;
            let k = key(collection, id);
            match records.get(&k).map(|record| record.version) {
                None => Ok(false),
                Some(version) if expected_version.is_some_and(|expected| expected != version) => {
                    Err(StoreError::conflict(collection, id))
                }
                Some(_) => Ok(records.remove(&k).is_some()),
            }
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.check_available() })
    }
}
