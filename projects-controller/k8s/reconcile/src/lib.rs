#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Converges each `Project` toward its namespace, role, and bindings, and holds
//! a deleted project until its namespace is gone.

use futures::prelude::*;
use kube::runtime::{
    controller::{self, Action, Controller},
    watcher,
};
use projects_controller_core::{
    finalizer::{self, WAIT_FOR_NAMESPACE},
    MissingUid, ProjectResources,
};
use projects_controller_k8s_api::{
    self as k8s, Api, ClusterRole, ClusterRoleBinding, Namespace, ObjectRef, Project, ResourceExt,
    RoleBinding,
};
use projects_controller_k8s_store::{self as store, modify, upsert, KubeStore, Outcome, Store};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{info_span, Instrument};

#[cfg(test)]
mod tests;

/// How long to wait before retrying a failed reconcile.
pub const ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct Reconciler<S> {
    store: S,
    namespace_role: k8s::RoleRef,
    namespace_poll: Duration,
}

/// The result of a single reconcile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reconciled {
    /// The project no longer exists.
    Missing,

    /// The project's resources and finalizer are in place.
    Applied(Applied),

    /// The project is being deleted and its namespace still exists.
    Terminating,

    /// The project's namespace is gone and its finalizer has been cleared.
    Finalized(Outcome),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Applied {
    pub namespace: Outcome,
    pub cluster_role: Outcome,
    pub cluster_role_binding: Outcome,
    pub role_binding: Outcome,
    pub finalizer: Outcome,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] store::Error),

    #[error(transparent)]
    MissingUid(#[from] MissingUid),
}

/// Runs the controller until its watches end.
pub async fn run(client: k8s::Client, reconciler: Reconciler<KubeStore>, concurrency: u16) {
    let projects = Api::<Project>::all(client.clone());
    let namespaces = Api::<Namespace>::all(client);
    Controller::new(projects, watcher::Config::default())
        .owns(namespaces, watcher::Config::default())
        .with_config(controller::Config::default().concurrency(concurrency))
        .run(reconcile, error_policy, Arc::new(reconciler))
        .for_each(|res| async move {
            match res {
                Ok((project, action)) => {
                    tracing::debug!(project = %project.name, ?action, "Reconciled")
                }
                Err(error) => tracing::warn!(%error, "Reconcile failed"),
            }
        })
        .await
}

pub async fn reconcile<S: Store>(
    project: Arc<Project>,
    ctx: Arc<Reconciler<S>>,
) -> Result<Action, Error> {
    let name = project.name_any();
    let reconciled = ctx
        .reconcile(&name)
        .instrument(info_span!("reconcile", project = %name))
        .await?;
    Ok(reconciled.action(ctx.namespace_poll))
}

pub fn error_policy<S: Store>(project: Arc<Project>, error: &Error, _: Arc<Reconciler<S>>) -> Action {
    tracing::warn!(project = %project.name_any(), %error, "Failed to reconcile project");
    Action::requeue(ERROR_BACKOFF)
}

// === impl Reconciler ===

impl<S: Store> Reconciler<S> {
    /// Creates a reconciler whose project role bindings grant `namespace_role`,
    /// polling every `namespace_poll` for a deleted project's namespace to
    /// disappear.
    pub fn new(store: S, namespace_role: k8s::RoleRef, namespace_poll: Duration) -> Self {
        Self {
            store,
            namespace_role,
            namespace_poll,
        }
    }

    /// Reconciles the named project against its current state in the store.
    pub async fn reconcile(&self, name: &str) -> Result<Reconciled, Error> {
        let Some(project) = self.store.get(&ObjectRef::<Project>::new(name)).await? else {
            tracing::debug!("Project no longer exists");
            return Ok(Reconciled::Missing);
        };

        if project.metadata.deletion_timestamp.is_some() {
            return self.terminate(&project).await;
        }
        self.apply(&project).await.map(Reconciled::Applied)
    }

    async fn apply(&self, project: &Project) -> Result<Applied, Error> {
        let ProjectResources {
            namespace,
            cluster_role,
            cluster_role_binding,
            role_binding,
        } = ProjectResources::new(project, &self.namespace_role)?;

        // An existing namespace is left as it is.
        let namespace = upsert(&self.store, namespace, |_: &mut Namespace| {}).await?;
        tracing::info!(kind = "Namespace", outcome = %namespace);

        let rules = cluster_role.rules.clone();
        let cluster_role = upsert(&self.store, cluster_role, move |cr: &mut ClusterRole| {
            cr.rules = rules;
        })
        .await?;
        tracing::info!(kind = "ClusterRole", outcome = %cluster_role);

        let role_ref = cluster_role_binding.role_ref.clone();
        let subjects = cluster_role_binding.subjects.clone();
        let cluster_role_binding = upsert(
            &self.store,
            cluster_role_binding,
            move |crb: &mut ClusterRoleBinding| {
                crb.role_ref = role_ref;
                crb.subjects = subjects;
            },
        )
        .await?;
        tracing::info!(kind = "ClusterRoleBinding", outcome = %cluster_role_binding);

        let role_ref = role_binding.role_ref.clone();
        let subjects = role_binding.subjects.clone();
        let role_binding = upsert(&self.store, role_binding, move |rb: &mut RoleBinding| {
            rb.role_ref = role_ref;
            rb.subjects = subjects;
        })
        .await?;
        tracing::info!(kind = "RoleBinding", outcome = %role_binding);

        let finalizer = modify(&self.store, project, |p: &mut Project| {
            finalizer::add(p, WAIT_FOR_NAMESPACE);
        })
        .await?;
        tracing::info!(finalizer = WAIT_FOR_NAMESPACE, outcome = %finalizer);

        Ok(Applied {
            namespace,
            cluster_role,
            cluster_role_binding,
            role_binding,
            finalizer,
        })
    }

    /// Deletes the project's namespace and clears the finalizer once the
    /// namespace no longer exists.
    async fn terminate(&self, project: &Project) -> Result<Reconciled, Error> {
        let key = ObjectRef::<Namespace>::new(&project.name_any());
        match self.store.get(&key).await? {
            None => {
                let outcome = modify(&self.store, project, |p: &mut Project| {
                    finalizer::remove(p, WAIT_FOR_NAMESPACE);
                })
                .await?;
                tracing::info!(finalizer = WAIT_FOR_NAMESPACE, outcome = %outcome, "Namespace deleted");
                Ok(Reconciled::Finalized(outcome))
            }

            Some(ns) if ns.metadata.deletion_timestamp.is_some() => {
                tracing::debug!("Waiting for namespace to be deleted");
                Ok(Reconciled::Terminating)
            }

            Some(_) => {
                match self.store.delete(&key).await {
                    Ok(()) => tracing::info!(namespace = %key.name, "Deleting namespace"),
                    Err(error) if error.is_not_found() => {}
                    Err(error) => return Err(error.into()),
                }
                Ok(Reconciled::Terminating)
            }
        }
    }
}

// === impl Reconciled ===

impl Reconciled {
    /// Determines when the project should next be reconciled.
    pub fn action(&self, namespace_poll: Duration) -> Action {
        match self {
            Self::Terminating => Action::requeue(namespace_poll),
            Self::Missing | Self::Applied(_) | Self::Finalized(_) => Action::await_change(),
        }
    }
}
