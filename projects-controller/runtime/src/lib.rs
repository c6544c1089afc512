pub use projects_controller_core as core;
pub use projects_controller_k8s_api as k8s;
pub use projects_controller_k8s_reconcile as reconcile;
pub use projects_controller_k8s_store as store;

mod admission;
mod args;

pub use self::{admission::Admission, args::Args};
