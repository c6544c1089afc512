use crate::{Error, Object, Result, Store};
use chrono::Utc;
use kube::error::ErrorResponse;
use parking_lot::Mutex;
use projects_controller_k8s_api::{ObjectMeta, ObjectRef, Time};
use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

/// An in-memory [`Store`] that mimics the API server behaviors the controller
/// depends on.
///
/// Objects are assigned a uid and a resource version when written, and
/// replacing an object with a stale resource version fails with a conflict.
/// Deleting an object that carries finalizers only marks it for deletion; it is
/// removed once its last finalizer is cleared. Deleting a namespace removes its
/// contents, and removing an object removes everything it owns.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<Key, Entry>,
    uids: u64,
    versions: u64,
    unavailable: HashSet<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Key {
    kind: String,
    namespace: Option<String>,
    name: String,
}

/// The metadata of a stored object is authoritative over the metadata in its
/// encoded form.
#[derive(Debug)]
struct Entry {
    meta: ObjectMeta,
    object: serde_json::Value,
}

// === impl MemoryStore ===

impl MemoryStore {
    /// Causes every request for kind `K` to fail as if the API server were
    /// unavailable.
    pub fn fail<K: Object>(&self) {
        self.state.lock().unavailable.insert(K::kind(&()).to_string());
    }

    /// Undoes [`MemoryStore::fail`].
    pub fn heal<K: Object>(&self) {
        self.state.lock().unavailable.remove(K::kind(&()).as_ref());
    }

    /// Returns the names of all stored objects of kind `K`.
    pub fn names<K: Object>(&self) -> Vec<String> {
        let kind = K::kind(&());
        self.state
            .lock()
            .objects
            .keys()
            .filter(|k| k.kind == kind)
            .map(|k| k.name.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn get<K: Object>(&self, key: &ObjectRef<K>) -> Result<Option<K>> {
        let state = self.state.lock();
        state.check::<K>()?;
        state
            .objects
            .get(&Key::from_ref(key))
            .map(|e| e.decode::<K>())
            .transpose()
    }

    async fn list<K: Object>(&self) -> Result<Vec<K>> {
        let state = self.state.lock();
        state.check::<K>()?;
        let kind = K::kind(&());
        state
            .objects
            .iter()
            .filter(|(k, _)| k.kind == kind)
            .map(|(_, e)| e.decode())
            .collect()
    }

    async fn create<K: Object>(&self, obj: &K) -> Result<K> {
        self.state.lock().create(obj)
    }

    async fn replace<K: Object>(&self, obj: &K) -> Result<K> {
        self.state.lock().replace(obj)
    }

    async fn delete<K: Object>(&self, key: &ObjectRef<K>) -> Result<()> {
        let mut state = self.state.lock();
        state.check::<K>()?;
        let k = Key::from_ref(key);
        if !state.objects.contains_key(&k) {
            return Err(Error::not_found(key));
        }
        state.delete(&k);
        Ok(())
    }
}

// === impl State ===

impl State {
    fn check<K: Object>(&self) -> Result<()> {
        let kind = K::kind(&());
        if self.unavailable.contains(kind.as_ref()) {
            return Err(Error::Kube(kube::Error::Api(ErrorResponse {
                status: "Failure".to_string(),
                message: format!("{kind} is unavailable"),
                reason: "ServiceUnavailable".to_string(),
                code: 503,
            })));
        }
        Ok(())
    }

    fn next_uid(&mut self) -> String {
        self.uids += 1;
        format!("00000000-0000-0000-0000-{:012}", self.uids)
    }

    fn next_version(&mut self) -> String {
        self.versions += 1;
        self.versions.to_string()
    }

    fn create<K: Object>(&mut self, obj: &K) -> Result<K> {
        self.check::<K>()?;
        let key = ObjectRef::from_obj(obj);
        let k = Key::from_ref(&key);
        if self.objects.contains_key(&k) {
            return Err(Error::already_exists(&key));
        }

        let mut meta = obj.meta().clone();
        meta.uid = Some(self.next_uid());
        meta.resource_version = Some(self.next_version());
        meta.creation_timestamp = Some(Time(Utc::now()));
        meta.deletion_timestamp = None;

        let entry = Entry {
            meta,
            object: serde_json::to_value(obj)?,
        };
        let created = entry.decode()?;
        self.objects.insert(k, entry);
        Ok(created)
    }

    fn replace<K: Object>(&mut self, obj: &K) -> Result<K> {
        self.check::<K>()?;
        let key = ObjectRef::from_obj(obj);
        let k = Key::from_ref(&key);
        let current = match self.objects.get(&k) {
            Some(entry) => entry.meta.clone(),
            None => return Err(Error::not_found(&key)),
        };
        if let Some(version) = obj.meta().resource_version.as_ref() {
            if current.resource_version.as_ref() != Some(version) {
                return Err(Error::conflict(&key));
            }
        }

        let mut meta = obj.meta().clone();
        meta.uid = current.uid;
        meta.creation_timestamp = current.creation_timestamp;
        meta.deletion_timestamp = current.deletion_timestamp;
        meta.resource_version = Some(self.next_version());
        let finalized = meta.deletion_timestamp.is_some() && !has_finalizers(&meta);

        let entry = Entry {
            meta,
            object: serde_json::to_value(obj)?,
        };
        let replaced = entry.decode()?;
        self.objects.insert(k.clone(), entry);
        if finalized {
            self.remove(&k);
        }
        Ok(replaced)
    }

    /// Removes an object, or marks it for deletion if it has finalizers.
    fn delete(&mut self, k: &Key) {
        let marked = match self.objects.get(k) {
            Some(entry) if has_finalizers(&entry.meta) => entry.meta.deletion_timestamp.is_some(),
            Some(_) => return self.remove(k),
            None => return,
        };
        if !marked {
            let version = self.next_version();
            if let Some(entry) = self.objects.get_mut(k) {
                entry.meta.deletion_timestamp = Some(Time(Utc::now()));
                entry.meta.resource_version = Some(version);
            }
            // A terminating namespace is emptied before its finalizers clear.
            for content in self.namespace_contents(k) {
                self.delete(&content);
            }
        }
    }

    fn namespace_contents(&self, k: &Key) -> Vec<Key> {
        if k.kind != "Namespace" {
            return Vec::new();
        }
        self.objects
            .keys()
            .filter(|o| o.namespace.as_deref() == Some(k.name.as_str()))
            .cloned()
            .collect()
    }

    /// Removes an object along with its namespace contents and dependents.
    fn remove(&mut self, k: &Key) {
        let Some(entry) = self.objects.remove(k) else {
            return;
        };

        let mut dependents = self.namespace_contents(k);
        if let Some(uid) = entry.meta.uid.as_deref() {
            dependents.extend(
                self.objects
                    .iter()
                    .filter(|(_, e)| {
                        e.meta
                            .owner_references
                            .iter()
                            .flatten()
                            .any(|o| o.uid == uid)
                    })
                    .map(|(o, _)| o.clone()),
            );
        }

        for dependent in dependents {
            self.delete(&dependent);
        }
    }
}

fn has_finalizers(meta: &ObjectMeta) -> bool {
    meta.finalizers.as_ref().is_some_and(|fs| !fs.is_empty())
}

// === impl Key ===

impl Key {
    fn from_ref<K: Object>(key: &ObjectRef<K>) -> Self {
        Self {
            kind: K::kind(&()).to_string(),
            namespace: key.namespace.clone(),
            name: key.name.clone(),
        }
    }
}

// === impl Entry ===

impl Entry {
    fn decode<K: Object>(&self) -> Result<K> {
        let mut obj = serde_json::from_value::<K>(self.object.clone())?;
        *obj.meta_mut() = self.meta.clone();
        Ok(obj)
    }
}
