use projects_controller_k8s_api::Resource;

/// Holds a project until its namespace is fully gone.
pub const WAIT_FOR_NAMESPACE: &str = "wait-for-namespace-to-be-deleted";

pub fn contains<K: Resource>(obj: &K, finalizer: &str) -> bool {
    obj.meta()
        .finalizers
        .as_ref()
        .is_some_and(|fs| fs.iter().any(|f| f == finalizer))
}

/// Appends `finalizer` unless already present. Returns true if `obj` changed.
pub fn add<K: Resource>(obj: &mut K, finalizer: &str) -> bool {
    if contains(obj, finalizer) {
        return false;
    }
    obj.meta_mut()
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(finalizer.to_string());
    true
}

/// Removes every occurrence of `finalizer`. Returns true if `obj` changed.
pub fn remove<K: Resource>(obj: &mut K, finalizer: &str) -> bool {
    let meta = obj.meta_mut();
    let Some(fs) = meta.finalizers.as_mut() else {
        return false;
    };
    let before = fs.len();
    fs.retain(|f| f != finalizer);
    let changed = fs.len() != before;
    if fs.is_empty() {
        meta.finalizers = None;
    }
    changed
}
