use std::sync::Arc;

use futures::{future, StreamExt};
use k8s_openapi::api::core::v1::Service;
use kube::runtime::{watcher, WatchStreamExt};
use kube::Api;

use crate::core::error::Error;
use crate::core::retry::retry_with_backoff;
use crate::model::context::ContextData;
use crate::model::key::ServiceKey;
use crate::service::reconciler_svc::is_load_balancer;

/// Feeds Service deletions into the reconciler.
///
/// The controller only schedules reconciles for objects still present in its
/// cache, so deletions are taken from a dedicated watch stream.
pub async fn watch_deletions(services_api: Api<Service>, context: Arc<ContextData>) {
    let concurrency = context.deletion_concurrency.max(1);

    watcher(services_api, watcher::Config::default())
        .default_backoff()
        .filter_map(|event| future::ready(match event {
            Ok(watcher::Event::Deleted(service)) => deleted_load_balancer(&service),
            Ok(_) => None,
            Err(err) => {
                log::warn!("Service deletion watch error - {err}");
                None
            }
        }))
        .for_each_concurrent(concurrency, |key| reconcile_deletion(key, context.clone()))
        .await;

    log::info!("Service deletion watch terminated");
}

/// Key of a deleted service that may hold an allocator address
fn deleted_load_balancer(service: &Service) -> Option<ServiceKey> {
    if !is_load_balancer(service) {
        return None;
    }
    match ServiceKey::from_service(service) {
        Ok(key) => Some(key),
        Err(err) => {
            log::warn!("Ignoring deletion event - {err}");
            None
        }
    }
}

async fn reconcile_deletion(key: ServiceKey, context: Arc<ContextData>) {
    let res = retry_with_backoff(&context.deletion_retry, "deletion reconcile", Error::is_retryable, || {
        context.reconciler.reconcile(&key)
    }).await;

    match res {
        Ok(outcome) => log::debug!("Deleted Service {key} reconciled - {outcome:?}"),
        Err(err) => log::error!("Deleted Service {key} could not be reconciled, its public IP may leak - {err}"),
    }
}
