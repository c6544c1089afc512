use crate::subject;
use projects_controller_k8s_api::{
    self as k8s, ObjectMeta, Project, Resource, ResourceExt, PROJECTS_API_GROUP, RBAC_API_GROUP,
};
use thiserror::Error;

/// Verbs granted on a project to the subjects listed in its access list.
pub const SELF_MANAGEMENT_VERBS: [&str; 5] = ["get", "update", "delete", "patch", "watch"];

/// The desired state of every object a project owns.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectResources {
    pub namespace: k8s::Namespace,
    pub cluster_role: k8s::ClusterRole,
    pub cluster_role_binding: k8s::ClusterRoleBinding,
    pub role_binding: k8s::RoleBinding,
}

/// A project that has not been persisted cannot own other objects.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("project {0} has no uid")]
pub struct MissingUid(pub String);

// === impl ProjectResources ===

impl ProjectResources {
    /// Builds the objects for `project`. The namespace-scoped binding grants
    /// `namespace_role` to the project's subjects.
    pub fn new(project: &Project, namespace_role: &k8s::RoleRef) -> Result<Self, MissingUid> {
        let name = project.name_any();
        let owner = project
            .controller_owner_ref(&())
            .ok_or_else(|| MissingUid(name.clone()))?;
        let meta = |name: String, namespace: Option<String>| ObjectMeta {
            name: Some(name),
            namespace,
            owner_references: Some(vec![owner.clone()]),
            ..Default::default()
        };
        let subjects = subject::subjects(&project.spec.access);

        let namespace = k8s::Namespace {
            metadata: ObjectMeta {
                labels: project.metadata.labels.clone(),
                ..meta(name.clone(), None)
            },
            ..Default::default()
        };

        let cluster_role = k8s::ClusterRole {
            metadata: meta(cluster_role_name(&name), None),
            rules: Some(vec![self_management_rule(&name)]),
            ..Default::default()
        };

        let cluster_role_binding = k8s::ClusterRoleBinding {
            metadata: meta(cluster_role_binding_name(&name), None),
            role_ref: cluster_role_ref(cluster_role_name(&name)),
            subjects: Some(subjects.clone()),
        };

        let role_binding = k8s::RoleBinding {
            metadata: meta(role_binding_name(&name), Some(name.clone())),
            role_ref: namespace_role.clone(),
            subjects: Some(subjects),
        };

        Ok(Self {
            namespace,
            cluster_role,
            cluster_role_binding,
            role_binding,
        })
    }
}

pub fn cluster_role_name(project: &str) -> String {
    format!("{project}-clusterrole")
}

pub fn cluster_role_binding_name(project: &str) -> String {
    format!("{project}-clusterrolebinding")
}

pub fn role_binding_name(project: &str) -> String {
    format!("{project}-rolebinding")
}

/// References a `ClusterRole` by name.
pub fn cluster_role_ref(name: impl ToString) -> k8s::RoleRef {
    k8s::RoleRef {
        api_group: RBAC_API_GROUP.to_string(),
        kind: "ClusterRole".to_string(),
        name: name.to_string(),
    }
}

/// Permits operations on a single project, and no other.
pub fn self_management_rule(project: &str) -> k8s::PolicyRule {
    k8s::PolicyRule {
        api_groups: Some(vec![PROJECTS_API_GROUP.to_string()]),
        resources: Some(vec![Project::plural(&()).to_string()]),
        resource_names: Some(vec![project.to_string()]),
        verbs: SELF_MANAGEMENT_VERBS.iter().map(|v| v.to_string()).collect(),
        ..Default::default()
    }
}
