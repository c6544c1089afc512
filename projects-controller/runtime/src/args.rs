use crate::{
    admission::Admission,
    core::resources::cluster_role_ref,
    k8s,
    reconcile::{self, Reconciler},
    store::KubeStore,
};
use anyhow::{bail, Result};
use clap::Parser;
use std::time::Duration;
use tracing::{info, info_span, instrument, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "projects", about = "A project namespace controller")]
pub struct Args {
    #[clap(
        long,
        default_value = "projects=info,warn",
        env = "PROJECTS_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// The ClusterRole granted to a project's subjects within its namespace.
    #[clap(long, env = "CLUSTER_ROLE_REF")]
    cluster_role_ref: String,

    #[clap(long, default_value = "1")]
    max_concurrent_reconciles: u16,

    /// How often a deleted project's namespace is checked for removal.
    #[clap(long, default_value = "2000")]
    namespace_poll_interval_ms: u64,

    #[clap(long)]
    admission_controller_disabled: bool,

    #[clap(long)]
    reconciler_disabled: bool,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            server,
            cluster_role_ref: role,
            max_concurrent_reconciles,
            namespace_poll_interval_ms,
            admission_controller_disabled,
            reconciler_disabled,
        } = self;

        if role.is_empty() {
            bail!("--cluster-role-ref must not be empty");
        }
        if max_concurrent_reconciles == 0 {
            bail!("--max-concurrent-reconciles must be at least 1");
        }

        let server = if admission_controller_disabled {
            None
        } else {
            Some(server)
        };

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_admin(admin.into_builder())
            .with_client(client)
            .with_optional_server(server)
            .build()
            .await?;

        let store = KubeStore::new(runtime.client());

        if reconciler_disabled {
            info!("Project reconciler disabled");
        } else {
            let reconciler = Reconciler::new(
                store.clone(),
                cluster_role_ref(&role),
                Duration::from_millis(namespace_poll_interval_ms),
            );
            tokio::spawn(
                controller(
                    runtime.client(),
                    reconciler,
                    max_concurrent_reconciles,
                    runtime.shutdown_handle(),
                )
                .instrument(info_span!("projects")),
            );
        }

        let admission = Admission::new(store);
        let runtime = runtime.spawn_server(move || admission);

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

#[instrument(skip_all, fields(concurrency = concurrency))]
async fn controller(
    client: k8s::Client,
    reconciler: Reconciler<KubeStore>,
    concurrency: u16,
    drain: kubert::shutdown::Watch,
) {
    info!("Starting project reconciler");
    tokio::select! {
        _ = reconcile::run(client, reconciler, concurrency) => {
            info!("Project watches ended");
        }
        handle = drain.signaled() => {
            info!("Stopping project reconciler");
            drop(handle);
        }
    }
}
