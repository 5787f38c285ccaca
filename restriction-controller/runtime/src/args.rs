use crate::{
    admission::Admission,
    core::Evaluator,
    index::Index,
    k8s::{self, RoleBindingRestriction},
    metrics::AdmissionMetrics,
    IndexLookup,
};
use anyhow::{bail, Result};
use clap::Parser;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "rolebinding-restriction",
    about = "Restricts the subjects that role bindings may reference"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "rolebinding_restriction=info,warn",
        env = "ROLEBINDING_RESTRICTION_LOG"
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

    /// Disables the admission controller server.
    #[clap(long)]
    admission_controller_disabled: bool,
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
            admission_controller_disabled,
        } = self;

        let server = if admission_controller_disabled {
            None
        } else {
            Some(server)
        };

        // Build the index that backs every admission decision.
        let index = Index::shared();

        let mut prom = <Registry>::default();
        let admission_metrics =
            AdmissionMetrics::register(prom.sub_registry_with_prefix("admission"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .with_optional_server(server)
            .build()
            .await?;

        // Spawn resource watches.

        let namespaces = runtime.watch_all::<k8s::Namespace>(watcher::Config::default());
        tokio::spawn(
            kubert::index::cluster(index.clone(), namespaces).instrument(info_span!("namespaces")),
        );

        let users = runtime.watch_all::<k8s::User>(watcher::Config::default());
        tokio::spawn(kubert::index::cluster(index.clone(), users).instrument(info_span!("users")));

        let groups = runtime.watch_all::<k8s::Group>(watcher::Config::default());
        tokio::spawn(
            kubert::index::cluster(index.clone(), groups).instrument(info_span!("groups")),
        );

        let restrictions = runtime.watch_all::<RoleBindingRestriction>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(index.clone(), restrictions)
                .instrument(info_span!("rolebindingrestrictions")),
        );

        let lookup = Arc::new(IndexLookup::new(index));
        let evaluator = Evaluator::builder()
            .with_restrictions(lookup.clone())
            .with_groups(lookup.clone())
            .with_labels(lookup)
            .build()?;

        if admission_controller_disabled {
            info!("Admission controller disabled");
        }
        let admission = Admission::new(evaluator, admission_metrics);
        let runtime = runtime.spawn_server(move || admission);

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
