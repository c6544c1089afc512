use crate::{Object, Result, Store};
use projects_controller_k8s_api::ObjectRef;
use std::fmt;

/// What a write did to the cluster.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
}

/// Creates `desired` if no object with its name exists. Otherwise applies
/// `mutate` to the current object and writes it back only if that changed it.
///
/// `mutate` is also applied to `desired` before it is created.
pub async fn upsert<S, K>(
    store: &S,
    mut desired: K,
    mutate: impl FnOnce(&mut K) + Send,
) -> Result<Outcome>
where
    S: Store,
    K: Object,
{
    let key = ObjectRef::from_obj(&desired);
    match store.get(&key).await? {
        Some(current) => modify(store, &current, mutate).await,
        None => {
            mutate(&mut desired);
            store.create(&desired).await?;
            Ok(Outcome::Created)
        }
    }
}

/// Applies `mutate` to a copy of `current` and replaces the stored object if
/// the copy differs.
pub async fn modify<S, K>(store: &S, current: &K, mutate: impl FnOnce(&mut K) + Send) -> Result<Outcome>
where
    S: Store,
    K: Object,
{
    let mut updated = current.clone();
    mutate(&mut updated);
    if updated == *current {
        return Ok(Outcome::Unchanged);
    }
    store.replace(&updated).await?;
    Ok(Outcome::Updated)
}

// === impl Outcome ===

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}
