//! Resource store seam between the reconcile steps and the API server
//!
//! Steps receive a `&dyn Store<K>` per kind they touch. [`KubeStore`] talks
//! to the cluster; [`MemoryStore`] keeps objects in a map and counts writes,
//! which is what the tests reconcile against.

mod kube_store;
mod memory;

pub use kube_store::KubeStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::controller::error::Result;
use crate::crd::NamespacedName;

/// CRUD access to objects of one kind
#[async_trait]
pub trait Store<K: Send + Sync + 'static>: Send + Sync {
    /// Fetch an object, `Ok(None)` when it does not exist
    async fn get(&self, key: &NamespacedName) -> Result<Option<K>>;

    async fn create(&self, obj: &K) -> Result<K>;

    /// Replace the object; the status subresource is left untouched
    async fn update(&self, obj: &K) -> Result<K>;

    /// Write the status subresource of the object
    async fn update_status(&self, obj: &K) -> Result<K>;

    /// Delete an object, `Ok(false)` when it was already gone
    async fn delete(&self, key: &NamespacedName) -> Result<bool>;
}
