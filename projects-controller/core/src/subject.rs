use projects_controller_k8s_api::{self as k8s, SubjectKind, SubjectRef, RBAC_API_GROUP};

/// Namespace assumed for service account subjects that omit one.
pub const DEFAULT_SERVICE_ACCOUNT_NAMESPACE: &str = "default";

/// Maps a project's subject reference to an RBAC subject.
///
/// Users and groups are qualified by the RBAC API group. Service accounts are
/// namespace-local and carry no API group.
pub fn subject(subject: &SubjectRef) -> k8s::Subject {
    match subject.kind {
        SubjectKind::User | SubjectKind::Group => k8s::Subject {
            kind: subject.kind.to_string(),
            name: subject.name.clone(),
            api_group: Some(RBAC_API_GROUP.to_string()),
            namespace: None,
        },
        SubjectKind::ServiceAccount => k8s::Subject {
            kind: subject.kind.to_string(),
            name: subject.name.clone(),
            api_group: None,
            namespace: Some(service_account_namespace(subject).to_string()),
        },
    }
}

pub fn service_account_namespace(subject: &SubjectRef) -> &str {
    subject
        .namespace
        .as_deref()
        .unwrap_or(DEFAULT_SERVICE_ACCOUNT_NAMESPACE)
}

pub fn subjects<'s>(access: impl IntoIterator<Item = &'s SubjectRef>) -> Vec<k8s::Subject> {
    access.into_iter().map(subject).collect()
}
