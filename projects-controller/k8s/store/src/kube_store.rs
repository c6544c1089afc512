use crate::{Error, Object, Result, Store};
use projects_controller_core::FIELD_MANAGER;
use projects_controller_k8s_api::{Client, DeleteParams, ListParams, ObjectRef, PostParams};

/// A [`Store`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

// === impl KubeStore ===

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Store for KubeStore {
    async fn get<K: Object>(&self, key: &ObjectRef<K>) -> Result<Option<K>> {
        let api = K::api(self.client.clone(), key.namespace.as_deref());
        api.get_opt(&key.name)
            .await
            .map_err(|error| Error::from_kube(error, key))
    }

    async fn list<K: Object>(&self) -> Result<Vec<K>> {
        let api = K::api(self.client.clone(), None);
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn create<K: Object>(&self, obj: &K) -> Result<K> {
        let key = ObjectRef::from_obj(obj);
        let api = K::api(self.client.clone(), key.namespace.as_deref());
        let created = api
            .create(&post_params(), obj)
            .await
            .map_err(|error| Error::from_kube(error, &key))?;
        tracing::debug!(kind = %K::kind(&()), name = %key.name, "Created");
        Ok(created)
    }

    async fn replace<K: Object>(&self, obj: &K) -> Result<K> {
        let key = ObjectRef::from_obj(obj);
        let api = K::api(self.client.clone(), key.namespace.as_deref());
        let replaced = api
            .replace(&key.name, &post_params(), obj)
            .await
            .map_err(|error| Error::from_kube(error, &key))?;
        tracing::debug!(kind = %K::kind(&()), name = %key.name, "Replaced");
        Ok(replaced)
    }

    async fn delete<K: Object>(&self, key: &ObjectRef<K>) -> Result<()> {
        let api = K::api(self.client.clone(), key.namespace.as_deref());
        api.delete(&key.name, &DeleteParams::background())
            .await
            .map_err(|error| Error::from_kube(error, key))?;
        tracing::debug!(kind = %K::kind(&()), name = %key.name, "Deleted");
        Ok(())
    }
}
