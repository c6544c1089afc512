#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Read and write access to cluster objects.
//!
//! The [`Store`] trait is the only way the controller touches the API server,
//! so reconciliation and admission logic can run against [`KubeStore`] in
//! production and against an in-memory store in tests.

mod error;
mod kube_store;
#[cfg(feature = "test-util")]
mod memory;
mod upsert;

pub use self::{
    error::{Error, Result},
    kube_store::KubeStore,
    upsert::{modify, upsert, Outcome},
};
#[cfg(feature = "test-util")]
pub use self::memory::MemoryStore;

use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use projects_controller_k8s_api::{Api, Client, ObjectRef, Resource};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

/// A kind of object the controller reads or writes.
pub trait Object:
    Resource<DynamicType = ()>
    + Clone
    + fmt::Debug
    + PartialEq
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Builds an API handle scoped to `namespace`, or to the whole cluster.
    fn api(client: Client, namespace: Option<&str>) -> Api<Self>;
}

/// Selects the API handle appropriate for a resource scope.
pub trait ApiScope {
    fn api<K>(client: Client, namespace: Option<&str>) -> Api<K>
    where
        K: Resource<Scope = Self, DynamicType = ()> + Clone + DeserializeOwned + fmt::Debug;
}

#[async_trait::async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    /// Fetches an object, returning `None` if it does not exist.
    async fn get<K: Object>(&self, key: &ObjectRef<K>) -> Result<Option<K>>;

    /// Lists every object of a kind across the cluster.
    async fn list<K: Object>(&self) -> Result<Vec<K>>;

    async fn create<K: Object>(&self, obj: &K) -> Result<K>;

    /// Replaces an object. Fails with a conflict if the object's resource
    /// version is stale.
    async fn replace<K: Object>(&self, obj: &K) -> Result<K>;

    /// Requests deletion of an object. Objects with finalizers are only marked
    /// for deletion.
    async fn delete<K: Object>(&self, key: &ObjectRef<K>) -> Result<()>;
}

// === impl Object ===

impl<K> Object for K
where
    K: Resource<DynamicType = ()>
        + Clone
        + fmt::Debug
        + PartialEq
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
    K::Scope: ApiScope,
{
    fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
        <K::Scope as ApiScope>::api(client, namespace)
    }
}

// === impl ApiScope ===

impl ApiScope for NamespaceResourceScope {
    fn api<K>(client: Client, namespace: Option<&str>) -> Api<K>
    where
        K: Resource<Scope = Self, DynamicType = ()> + Clone + DeserializeOwned + fmt::Debug,
    {
        match namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        }
    }
}

impl ApiScope for ClusterResourceScope {
    fn api<K>(client: Client, _: Option<&str>) -> Api<K>
    where
        K: Resource<Scope = Self, DynamicType = ()> + Clone + DeserializeOwned + fmt::Debug,
    {
        Api::all(client)
    }
}
