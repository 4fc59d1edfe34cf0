use std::fmt::Debug;
use std::marker::PhantomData;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::Store;
use crate::controller::error::{Error, Result};
use crate::crd::NamespacedName;
use crate::resources::FIELD_MANAGER;

/// [`Store`] backed by the Kubernetes API
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Clone for KubeStore<K> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

impl<K> KubeStore<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

impl<K> KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn api_for(&self, obj: &K) -> Result<Api<K>> {
        let ns = obj
            .namespace()
            .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
        Ok(self.api(&ns))
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

#[async_trait]
impl<K> Store<K> for KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
    <K as Resource>::DynamicType: Default,
{
    async fn get(&self, key: &NamespacedName) -> Result<Option<K>> {
        Ok(self.api(&key.namespace).get_opt(&key.name).await?)
    }

    async fn create(&self, obj: &K) -> Result<K> {
        let created = self.api_for(obj)?.create(&post_params(), obj).await?;
        debug!("Created {}", NamespacedName::of(&created));
        Ok(created)
    }

    async fn update(&self, obj: &K) -> Result<K> {
        let name = obj.name_any();
        let updated = self.api_for(obj)?.replace(&name, &post_params(), obj).await?;
        debug!("Updated {}", NamespacedName::of(&updated));
        Ok(updated)
    }

    async fn update_status(&self, obj: &K) -> Result<K> {
        let name = obj.name_any();
        let status = serde_json::to_value(obj)?
            .get("status")
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        // resourceVersion makes the merge patch fail with 409 on a stale read
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": obj.resource_version() },
            "status": status,
        });

        let updated = self
            .api_for(obj)?
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        debug!("Updated status of {}", NamespacedName::of(&updated));
        Ok(updated)
    }

    async fn delete(&self, key: &NamespacedName) -> Result<bool> {
        match self
            .api(&key.namespace)
            .delete(&key.name, &DeleteParams::default())
            .await
        {
            Ok(_) => {
                debug!("Deleted {}", key);
                Ok(true)
            }
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
