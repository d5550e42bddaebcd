use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-subject async mutex.
///
/// Operations for one subject run one at a time inside the process; different
/// subjects never wait on each other. Entries are held weakly and pruned once
/// no guard or waiter references them.
#[derive(Default)]
pub struct SubjectLocks {
    locks: Mutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl SubjectLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, subject_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| lock.strong_count() > 0);
            match locks.get(subject_id).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(Mutex::new(()));
                    locks.insert(subject_id.to_string(), Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        let locks = self.locks.lock().await;
        locks.values().filter(|lock| lock.strong_count() > 0).count()
    }
}
