use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Creating a ProjectAccess asks which projects the requesting identity can
/// reach. The admission service fills in the status before it is persisted.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "projects.vmware.com",
    version = "v1alpha1",
    kind = "ProjectAccess",
    status = "ProjectAccessStatus",
    derive = "Default",
    derive = "PartialEq"
)]
pub struct ProjectAccessSpec {}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct ProjectAccessStatus {
    /// Names of the projects visible to the identity that created the object.
    #[serde(default)]
    pub projects: Vec<String>,
}
