#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod project;
pub mod project_access;

pub use self::{
    project::{Project, ProjectSpec, SubjectKind, SubjectRef},
    project_access::{ProjectAccess, ProjectAccessSpec, ProjectAccessStatus},
};
pub use k8s_openapi::{
    api::{
        self,
        authentication::v1::UserInfo,
        core::v1::Namespace,
        rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleBinding, RoleRef, Subject},
    },
    apimachinery::pkg::apis::meta::v1::{OwnerReference, Time},
};
pub use kube::{
    api::{Api, DeleteParams, ListParams, ObjectMeta, PostParams, ResourceExt},
    runtime::reflector::ObjectRef,
    Client, Error, Resource,
};

/// The API group that `Project` and `ProjectAccess` resources belong to.
pub const PROJECTS_API_GROUP: &str = "projects.vmware.com";

/// The API group of RBAC roles, bindings, and user/group subjects.
pub const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";
