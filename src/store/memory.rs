use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::{Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::Store;
use crate::controller::error::{Error, Result};
use crate::crd::NamespacedName;

/// In-memory [`Store`] that behaves like the API server where it matters to
/// the reconcile steps:
///
/// - every write bumps `resourceVersion`, and writing an object carrying a
///   stale one fails with [`Error::Conflict`]
/// - `update` keeps the stored status, `update_status` only takes the status
/// - deleting an object with finalizers only sets its deletion timestamp; it
///   disappears once an update removes the last finalizer
///
/// Writes are counted per operation, and failures can be injected.
pub struct MemoryStore<K> {
    objects: Mutex<BTreeMap<NamespacedName, K>>,
    next_version: AtomicU64,
    creates: AtomicUsize,
    updates: AtomicUsize,
    status_updates: AtomicUsize,
    deletes: AtomicUsize,
    fail_gets: AtomicBool,
    fail_writes: AtomicBool,
}

impl<K> Default for MemoryStore<K> {
    fn default() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            next_version: AtomicU64::new(1),
            creates: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            status_updates: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            fail_gets: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }
}

impl<K> MemoryStore<K>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without counting a write
    pub fn insert(&self, mut obj: K) -> K {
        if obj.meta().resource_version.is_none() {
            obj.meta_mut().resource_version = Some(self.bump_version());
        }
        self.lock().insert(NamespacedName::of(&obj), obj.clone());
        obj
    }

    /// Stored copy of an object
    pub fn find(&self, key: &NamespacedName) -> Option<K> {
        self.lock().get(key).cloned()
    }

    pub fn contains(&self, key: &NamespacedName) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn status_updates(&self) -> usize {
        self.status_updates.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Total number of successful writes of any kind
    pub fn writes(&self) -> usize {
        self.creates() + self.updates() + self.status_updates() + self.deletes()
    }

    pub fn reset_counters(&self) {
        self.creates.store(0, Ordering::SeqCst);
        self.updates.store(0, Ordering::SeqCst);
        self.status_updates.store(0, Ordering::SeqCst);
        self.deletes.store(0, Ordering::SeqCst);
    }

    /// Make every subsequent `get` fail with a transient error
    pub fn set_fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail with a transient error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<NamespacedName, K>> {
        // A panicking test thread must not hide the map from the others
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn bump_version(&self) -> String {
        self.next_version.fetch_add(1, Ordering::SeqCst).to_string()
    }

    fn check_writable(&self, key: &NamespacedName) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::TransientError(format!("injected write failure for {}", key)));
        }
        Ok(())
    }

    /// Fail with a conflict when `obj` was read before `stored` last changed
    fn check_version(key: &NamespacedName, obj: &K, stored: &K) -> Result<()> {
        match (&obj.meta().resource_version, &stored.meta().resource_version) {
            (Some(theirs), Some(ours)) if theirs != ours => Err(Error::Conflict(key.to_string())),
            _ => Ok(()),
        }
    }
}

/// Copy of `target` whose `status` is taken from `source`
fn with_status_of<K: Serialize + DeserializeOwned>(target: &K, source: &K) -> Result<K> {
    let mut value = serde_json::to_value(target)?;
    let status = serde_json::to_value(source)?
        .get("status")
        .cloned()
        .filter(|s| !s.is_null());

    if let Some(map) = value.as_object_mut() {
        match status {
            Some(status) => {
                map.insert("status".to_string(), status);
            }
            None => {
                map.remove("status");
            }
        }
    }
    Ok(serde_json::from_value(value)?)
}

fn deletion_time() -> Result<Time> {
    Ok(serde_json::from_value(serde_json::json!(
        "2024-01-01T00:00:00Z"
    ))?)
}

#[async_trait]
impl<K> Store<K> for MemoryStore<K>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &NamespacedName) -> Result<Option<K>> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(Error::TransientError(format!("injected read failure for {}", key)));
        }
        Ok(self.find(key))
    }

    async fn create(&self, obj: &K) -> Result<K> {
        let key = NamespacedName::of(obj);
        self.check_writable(&key)?;
        if key.namespace.is_empty() {
            return Err(Error::MissingObjectKey(".metadata.namespace"));
        }

        let mut objects = self.lock();
        if objects.contains_key(&key) {
            return Err(Error::Conflict(format!("{} already exists", key)));
        }

        let mut created = obj.clone();
        created.meta_mut().resource_version = Some(self.bump_version());
        objects.insert(key, created.clone());
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }

    async fn update(&self, obj: &K) -> Result<K> {
        let key = NamespacedName::of(obj);
        self.check_writable(&key)?;

        let mut objects = self.lock();
        let stored = objects
            .get(&key)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        Self::check_version(&key, obj, stored)?;

        let mut updated = with_status_of(obj, stored)?;
        // Deletion timestamp is owned by the server
        updated.meta_mut().deletion_timestamp = stored.meta().deletion_timestamp.clone();
        updated.meta_mut().resource_version = Some(self.bump_version());
        self.updates.fetch_add(1, Ordering::SeqCst);

        if updated.meta().deletion_timestamp.is_some() && updated.finalizers().is_empty() {
            objects.remove(&key);
        } else {
            objects.insert(key, updated.clone());
        }
        Ok(updated)
    }

    async fn update_status(&self, obj: &K) -> Result<K> {
        let key = NamespacedName::of(obj);
        self.check_writable(&key)?;

        let mut objects = self.lock();
        let stored = objects
            .get(&key)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        Self::check_version(&key, obj, stored)?;

        let mut updated = with_status_of(stored, obj)?;
        updated.meta_mut().resource_version = Some(self.bump_version());
        objects.insert(key, updated.clone());
        self.status_updates.fetch_add(1, Ordering::SeqCst);
        Ok(updated)
    }

    async fn delete(&self, key: &NamespacedName) -> Result<bool> {
        self.check_writable(key)?;

        let mut objects = self.lock();
        let Some(stored) = objects.get_mut(key) else {
            return Ok(false);
        };

        if stored.finalizers().is_empty() {
            objects.remove(key);
        } else if stored.meta().deletion_timestamp.is_none() {
            stored.meta_mut().deletion_timestamp = Some(deletion_time()?);
            stored.meta_mut().resource_version = Some(self.bump_version());
        }
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}
