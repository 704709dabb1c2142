//! In-process object store.
//!
//! Useful for local development without S3 and for tests: it can inject
//! transient failures and cap listing pages the way S3 does.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::backend::{Blob, ObjectStore, ObjectStoreError};

/// S3 returns at most this many keys per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Default)]
struct State {
    objects: BTreeMap<String, Blob>,
    locked: BTreeSet<String>,
    pending_failures: u32,
    calls: u32,
}

/// [`ObjectStore`] kept in a mutex-guarded map.
pub struct MemoryObjectStore {
    state: Mutex<State>,
    page_size: usize,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Limit `list_keys` to `page_size` keys per call.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next `n` requests fail with a transient error.
    pub fn fail_next(&self, n: u32) {
        self.lock().pending_failures = n;
    }

    /// Make batch deletes refuse `key`, the way S3 reports a per-key error
    /// inside an otherwise successful response.
    pub fn lock_key(&self, key: &str) {
        self.lock().locked.insert(key.to_string());
    }

    /// Number of requests received, failed ones included.
    pub fn calls(&self) -> u32 {
        self.lock().calls
    }

    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count the request and consume one injected failure if any are pending.
    fn begin_request(&self) -> Result<MutexGuard<'_, State>, ObjectStoreError> {
        let mut state = self.lock();
        state.calls += 1;
        if state.pending_failures > 0 {
            state.pending_failures -= 1;
            return Err(ObjectStoreError::Request("injected failure".into()));
        }
        Ok(state)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let mut state = self.begin_request()?;
        state.objects.insert(
            key.to_string(),
            Blob {
                content_type: content_type.to_string(),
                bytes: bytes.to_vec(),
            },
        );
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Blob, ObjectStoreError> {
        let state = self.begin_request()?;
        state
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError> {
        let mut state = self.begin_request()?;
        state.objects.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, ObjectStoreError> {
        let state = self.begin_request()?;
        Ok(state.objects.keys().take(self.page_size).cloned().collect())
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<usize, ObjectStoreError> {
        let mut state = self.begin_request()?;
        let (refused, allowed): (Vec<&String>, Vec<&String>) =
            keys.iter().partition(|key| state.locked.contains(*key));

        for key in &allowed {
            state.objects.remove(*key);
        }

        if refused.is_empty() {
            Ok(keys.len())
        } else {
            Err(ObjectStoreError::Request(format!(
                "{} of {} keys not deleted",
                refused.len(),
                keys.len()
            )))
        }
    }
}
