use crate::identity::Requester;
use projects_controller_k8s_api::{Namespace, ProjectSpec, ResourceExt, SubjectRef};
use thiserror::Error;

/// Reasons a project may not be created.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Denied {
    #[error("cannot create project over existing namespace '{0}'")]
    NamespaceExists(String),
}

/// Rejects a project whose name collides with an existing namespace.
pub fn validate_create<'n>(
    project: &str,
    namespaces: impl IntoIterator<Item = &'n Namespace>,
) -> Result<(), Denied> {
    if namespaces.into_iter().any(|ns| ns.name_any() == project) {
        return Err(Denied::NamespaceExists(project.to_string()));
    }
    Ok(())
}

/// Returns the access list a newly created project should carry when it
/// declares none: the requester alone. Returns `None` when the declared
/// access should be kept.
pub fn default_access(spec: &ProjectSpec, username: &str) -> Option<Vec<SubjectRef>> {
    if !spec.access.is_empty() {
        return None;
    }
    let subject = match Requester::from_username(username) {
        Requester::ServiceAccount { namespace, name } => {
            SubjectRef::service_account(namespace, name)
        }
        Requester::User(name) => SubjectRef::user(name),
    };
    Some(vec![subject])
}
