use std::collections::HashSet;
use std::sync::Arc;

use k8s_openapi::api::core::v1::Service;
use metrics::counter;

use crate::core::error::Error;
use crate::dto::allocation::AllocationReqDto;
use crate::model::key::ServiceKey;
use crate::service::allocation_svc::AllocationApi;
use crate::service::context_svc::ContextProvider;
use crate::service::release_svc::{ReleaseDispatcher, ReleaseTask};
use crate::service::store_svc::ServiceStore;

pub const RECONCILE_METRIC_NAME: &str = "lbip_reconciles_total";
pub const LOAD_BALANCER_TYPE: &str = "LoadBalancer";

/// Terminal state reached by one reconcile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The service is gone, its release was handed to the release queue
    ReleaseDispatched,
    Ignored(IgnoreReason),
    /// Addresses already present, nothing to allocate
    AlreadyAssigned(Vec<String>),
    Allocated(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotLoadBalancer,
    ExcludedNamespace,
}

impl ReconcileOutcome {
    fn metric_label(&self) -> &'static str {
        match self {
            ReconcileOutcome::ReleaseDispatched => "release_dispatched",
            ReconcileOutcome::Ignored(IgnoreReason::NotLoadBalancer) => "ignored_type",
            ReconcileOutcome::Ignored(IgnoreReason::ExcludedNamespace) => "ignored_namespace",
            ReconcileOutcome::AlreadyAssigned(_) => "already_assigned",
            ReconcileOutcome::Allocated(_) => "allocated",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileSettings {
    pub excluded_namespaces: HashSet<String>,
    pub publish_status: bool,
}

/// The per-event decision procedure.
///
/// Every transition is derived from the currently observed service, never from
/// earlier reconciles, so redelivered notifications are harmless.
pub struct LoadBalancerReconciler {
    context: Arc<dyn ContextProvider>,
    services: Arc<dyn ServiceStore>,
    allocator: Arc<dyn AllocationApi>,
    releases: Arc<dyn ReleaseDispatcher>,
    settings: ReconcileSettings,
}

impl LoadBalancerReconciler {
    pub fn new(
        context: Arc<dyn ContextProvider>,
        services: Arc<dyn ServiceStore>,
        allocator: Arc<dyn AllocationApi>,
        releases: Arc<dyn ReleaseDispatcher>,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            context,
            services,
            allocator,
            releases,
            settings,
        }
    }

    pub async fn reconcile(&self, key: &ServiceKey) -> Result<ReconcileOutcome, Error> {
        let outcome = self.run(key).await;
        let label = match &outcome {
            Ok(outcome) => outcome.metric_label(),
            Err(_) => "error",
        };
        counter!(RECONCILE_METRIC_NAME, "outcome" => label).increment(1);
        outcome
    }

    async fn run(&self, key: &ServiceKey) -> Result<ReconcileOutcome, Error> {
        let credential = self.context.credential().await?;
        let cluster = self.context.cluster_identity().await?;
        if cluster.is_unresolved() {
            log::warn!("{} - no control-plane node carries a cluster id, allocator calls for {key} will target an empty cluster", Error::ClusterIdentityUnresolved);
        }

        let Some(service) = self.services.get(key).await? else {
            if self.is_excluded(key) {
                log::debug!("Service {key} deleted from an excluded namespace, nothing to release");
                return Ok(ReconcileOutcome::Ignored(IgnoreReason::ExcludedNamespace));
            }
            log::info!("Service {key} deleted, releasing its public IP");
            self.releases.dispatch(ReleaseTask::new(cluster, key.clone()));
            return Ok(ReconcileOutcome::ReleaseDispatched);
        };

        if let Some(reason) = self.ignore_reason(key, &service) {
            log::debug!("Ignoring Service {key} - {reason:?}");
            return Ok(ReconcileOutcome::Ignored(reason));
        }

        let assigned = assigned_addresses(&service);
        if !assigned.is_empty() {
            // externalIPs written but the status patch failed on an earlier pass
            if self.settings.publish_status && ingress_addresses(&service).is_empty() {
                log::info!("Publishing existing public IP {assigned:?} on Service {key} status");
                self.services.publish_ingress(key, &assigned).await?;
            } else {
                log::debug!("Service {key} already exposes {assigned:?}");
            }
            return Ok(ReconcileOutcome::AlreadyAssigned(assigned));
        }

        let req = AllocationReqDto::from_service(key, &service);
        let addresses = self.allocator.allocate(&cluster, &credential, &req).await
            .map_err(|err| {
                if cluster.is_unresolved() {
                    log::error!("Allocation for {key} failed against an unresolved cluster identity - {err}");
                }
                err
            })?;

        log::info!("Assigning public IP {addresses:?} to Service {key}");
        self.services.assign_addresses(key, &addresses, self.settings.publish_status).await?;

        Ok(ReconcileOutcome::Allocated(addresses))
    }

    fn ignore_reason(&self, key: &ServiceKey, service: &Service) -> Option<IgnoreReason> {
        if !is_load_balancer(service) {
            Some(IgnoreReason::NotLoadBalancer)
        } else if self.is_excluded(key) {
            Some(IgnoreReason::ExcludedNamespace)
        } else {
            None
        }
    }

    fn is_excluded(&self, key: &ServiceKey) -> bool {
        self.settings.excluded_namespaces.contains(&key.namespace)
    }
}

pub fn is_load_balancer(service: &Service) -> bool {
    service.spec.as_ref().and_then(|spec| spec.type_.as_deref()) == Some(LOAD_BALANCER_TYPE)
}

fn ingress_addresses(service: &Service) -> Vec<String> {
    service.status.as_ref()
        .and_then(|status| status.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .map(|ingress| ingress.iter()
            .flat_map(|entry| entry.ip.clone().or_else(|| entry.hostname.clone()))
            .collect::<Vec<_>>()
        )
        .unwrap_or_default()
}

/// Externally visible addresses, from the status ingress or from `spec.externalIPs`
pub fn assigned_addresses(service: &Service) -> Vec<String> {
    let ingress = ingress_addresses(service);
    if !ingress.is_empty() {
        return ingress;
    }

    service.spec.as_ref()
        .and_then(|spec| spec.external_ips.clone())
        .unwrap_or_default()
}
