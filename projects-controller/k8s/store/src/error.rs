use crate::Object;
use kube::error::ErrorResponse;
use projects_controller_k8s_api::ObjectRef;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },

    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: String, name: String },

    #[error("{kind} {name} was modified concurrently")]
    Conflict { kind: String, name: String },

    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error("failed to encode object: {0}")]
    Json(#[from] serde_json::Error),
}

// === impl Error ===

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub(crate) fn not_found<K: Object>(key: &ObjectRef<K>) -> Self {
        let (kind, name) = describe(key);
        Self::NotFound { kind, name }
    }

    pub(crate) fn already_exists<K: Object>(key: &ObjectRef<K>) -> Self {
        let (kind, name) = describe(key);
        Self::AlreadyExists { kind, name }
    }

    pub(crate) fn conflict<K: Object>(key: &ObjectRef<K>) -> Self {
        let (kind, name) = describe(key);
        Self::Conflict { kind, name }
    }

    /// Classifies an API server error about `key`.
    pub(crate) fn from_kube<K: Object>(error: kube::Error, key: &ObjectRef<K>) -> Self {
        match error {
            kube::Error::Api(ErrorResponse { code: 404, .. }) => Self::not_found(key),
            kube::Error::Api(ref rsp) if rsp.code == 409 && rsp.reason == "AlreadyExists" => {
                Self::already_exists(key)
            }
            kube::Error::Api(ErrorResponse { code: 409, .. }) => Self::conflict(key),
            error => Self::Kube(error),
        }
    }
}

fn describe<K: Object>(key: &ObjectRef<K>) -> (String, String) {
    let kind = K::kind(&()).to_string();
    let name = match key.namespace.as_deref() {
        Some(ns) => format!("{ns}/{}", key.name),
        None => key.name.clone(),
    };
    (kind, name)
}
