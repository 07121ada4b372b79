use std::future::ready;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Router};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::controller::Controller;
use kube::runtime::watcher::Config;
use kube::{Api, Client};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use lbip_operator::core::config::{compose_config, OperatorConfig};
use lbip_operator::model::context::ContextData;
use lbip_operator::policy::deletion::watch_deletions;
use lbip_operator::policy::error::error_policy;
use lbip_operator::policy::reconciliation::reconcile;
use lbip_operator::service::allocation_svc::AllocationClient;
use lbip_operator::service::context_svc::PlatformContext;
use lbip_operator::service::credential_svc::FileCredentialProvider;
use lbip_operator::service::identity_svc::{ClusterIdentityResolver, KubeNodeInventory};
use lbip_operator::service::reconciler_svc::{LoadBalancerReconciler, ReconcileSettings};
use lbip_operator::service::release_svc::{ReleaseQueue, ReleaseSettings};
use lbip_operator::service::store_svc::KubeServiceStore;

fn setup_metrics_recorder() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("Error installing metrics recorder")
}

async fn serve_metrics(address: SocketAddr, recorder_handle: PrometheusHandle) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/metrics", get(move || ready(recorder_handle.render())))
        .route("/healthz", get(|| ready("ok")));

    axum::Server::bind(&address)
        .serve(app.into_make_service())
        .await
        .context("Metrics server failure")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let app_config: OperatorConfig =
        compose_config("lbip-operator", "lbip").context("Error loading configuration")?;

    let kubernetes_client = Client::try_default().await?;

    let recorder_handle = setup_metrics_recorder()?;
    let metrics_address = app_config.metrics_address;
    tokio::spawn(async move {
        if let Err(err) = serve_metrics(metrics_address, recorder_handle).await {
            log::error!("{err:#}");
        }
    });

    let allocator = Arc::new(
        AllocationClient::new(&app_config.api_base_url, app_config.request_timeout(), app_config.allocate_retry())
            .context("Error building allocation client")?,
    );
    let platform = Arc::new(PlatformContext::new(
        FileCredentialProvider::new(&app_config.token_path),
        ClusterIdentityResolver::new(
            KubeNodeInventory::new(kubernetes_client.clone()),
            app_config.control_plane_labels.clone(),
            &app_config.cluster_id_label,
        ),
    ));

    let (release_queue, release_workers) = ReleaseQueue::start(
        platform.clone(),
        allocator.clone(),
        ReleaseSettings {
            workers: app_config.release_workers,
            capacity: app_config.release_queue_capacity,
            retry: app_config.release_retry(),
        },
    );

    let reconciler = LoadBalancerReconciler::new(
        platform,
        Arc::new(KubeServiceStore::new(kubernetes_client.clone())),
        allocator,
        Arc::new(release_queue),
        ReconcileSettings {
            excluded_namespaces: app_config.excluded_namespaces.iter().cloned().collect(),
            publish_status: app_config.publish_status,
        },
    );

    let context = Arc::new(ContextData {
        reconciler,
        error_requeue: app_config.error_requeue(),
        deletion_retry: app_config.release_retry(),
        deletion_concurrency: app_config.deletion_concurrency,
    });

    let services_api = Api::<Service>::all(kubernetes_client);
    let deletion_watch = tokio::spawn(watch_deletions(services_api.clone(), context.clone()));

    log::info!("Watching LoadBalancer services, allocator at {}", app_config.api_base_url);

    Controller::new(services_api, Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|reconciliation_result| async move {
            match reconciliation_result {
                Ok((service, _action)) => log::debug!("Reconciliation successful. Resource: {service}"),
                Err(reconciliation_err) => log::warn!("Reconciliation error: {reconciliation_err}"),
            }
        })
        .await;

    deletion_watch.abort();
    let _ = deletion_watch.await;

    let report = release_workers.join().await;
    log::info!(
        "Shutdown complete, {} releases done, {} dead letters",
        report.released.len(),
        report.dead_letters.len()
    );

    Ok(())
}
