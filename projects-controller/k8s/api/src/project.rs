use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A Project is a cluster-scoped request for an isolated namespace that a set
/// of subjects may use.
///
/// The project's name is also the name of the namespace created for it.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "projects.vmware.com",
    version = "v1alpha1",
    kind = "Project",
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    /// Subjects granted access to the project and its namespace.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access: Vec<SubjectRef>,
}

/// References a user, group, or service account that may access a project.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub struct SubjectRef {
    pub kind: SubjectKind,
    pub name: String,

    /// Only meaningful for `ServiceAccount` subjects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum SubjectKind {
    ServiceAccount,
    User,
    Group,
}

// === impl SubjectRef ===

impl SubjectRef {
    pub fn user(name: impl ToString) -> Self {
        Self {
            kind: SubjectKind::User,
            name: name.to_string(),
            namespace: None,
        }
    }

    pub fn group(name: impl ToString) -> Self {
        Self {
            kind: SubjectKind::Group,
            name: name.to_string(),
            namespace: None,
        }
    }

    pub fn service_account(namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            kind: SubjectKind::ServiceAccount,
            name: name.to_string(),
            namespace: Some(namespace.to_string()),
        }
    }
}

// === impl SubjectKind ===

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceAccount => "ServiceAccount",
            Self::User => "User",
            Self::Group => "Group",
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}
