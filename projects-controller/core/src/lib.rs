#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod access;
pub mod admission;
pub mod finalizer;
pub mod identity;
pub mod resources;
pub mod subject;

pub use self::{
    access::AccessIndex,
    admission::Denied,
    identity::Requester,
    resources::{MissingUid, ProjectResources},
};

/// Identifies writes made by the controller.
pub const FIELD_MANAGER: &str = "projects-controller";
