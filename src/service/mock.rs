use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{LoadBalancerIngress, LoadBalancerStatus, Service, ServiceStatus};
use kube::core::ErrorResponse;

use crate::core::error::Error;
use crate::dto::allocation::AllocationReqDto;
use crate::model::credential::Credential;
use crate::model::identity::ClusterIdentity;
use crate::model::key::ServiceKey;
use crate::service::allocation_svc::AllocationApi;
use crate::service::context_svc::ContextProvider;
use crate::service::release_svc::{ReleaseDispatcher, ReleaseTask};
use crate::service::store_svc::ServiceStore;

pub struct MockContext {
    credential: Option<String>,
    cluster: ClusterIdentity,
}

impl MockContext {
    pub fn ready(cluster: &str) -> Self {
        Self {
            credential: Some(String::from("test-token")),
            cluster: ClusterIdentity::new(cluster),
        }
    }

    pub fn without_credential(cluster: &str) -> Self {
        Self {
            credential: None,
            cluster: ClusterIdentity::new(cluster),
        }
    }

    pub fn with_empty_credential(cluster: &str) -> Self {
        Self {
            credential: Some(String::new()),
            cluster: ClusterIdentity::new(cluster),
        }
    }
}

#[async_trait]
impl ContextProvider for MockContext {
    async fn credential(&self) -> Result<Credential, Error> {
        let path = PathBuf::from("/var/run/secrets/test/token");
        match &self.credential {
            None => Err(Error::CredentialUnavailable {
                path,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            }),
            Some(token) if token.is_empty() => Err(Error::CredentialEmpty { path }),
            Some(token) => Ok(Credential::new(token.as_str())),
        }
    }

    async fn cluster_identity(&self) -> Result<ClusterIdentity, Error> {
        Ok(self.cluster.clone())
    }
}

/// Allocator that hands out addresses from a fixed list and records every call.
///
/// Like the real endpoint it rejects requests for an unresolved cluster.
pub struct MockAllocator {
    addresses: Vec<String>,
    release_failures: AtomicUsize,
    allocations: Mutex<Vec<(ClusterIdentity, AllocationReqDto)>>,
    releases: Mutex<Vec<(ClusterIdentity, ServiceKey)>>,
    release_attempts: AtomicUsize,
}

impl Default for MockAllocator {
    fn default() -> Self {
        Self {
            addresses: vec![String::from("203.0.113.5")],
            release_failures: AtomicUsize::new(0),
            allocations: Mutex::new(Vec::new()),
            releases: Mutex::new(Vec::new()),
            release_attempts: AtomicUsize::new(0),
        }
    }
}

impl MockAllocator {
    pub fn with_addresses(addresses: &[&str]) -> Self {
        Self {
            addresses: addresses.iter().map(|a| String::from(*a)).collect(),
            ..Default::default()
        }
    }

    /// Fails the next `count` release attempts with a retryable error
    pub fn failing_releases(self, count: usize) -> Self {
        self.release_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn allocations(&self) -> Vec<(ClusterIdentity, AllocationReqDto)> {
        self.allocations.lock().unwrap().clone()
    }

    pub fn releases(&self) -> Vec<(ClusterIdentity, ServiceKey)> {
        self.releases.lock().unwrap().clone()
    }

    pub fn release_attempts(&self) -> usize {
        self.release_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AllocationApi for MockAllocator {
    async fn allocate(&self, cluster: &ClusterIdentity, _credential: &Credential, req: &AllocationReqDto) -> Result<Vec<String>, Error> {
        self.allocations.lock().unwrap().push((cluster.clone(), req.clone()));
        if cluster.is_unresolved() {
            return Err(Error::AllocationRequestFailed {
                reason: String::from("POST /api/cluster//service returned 404 Not Found"),
                retryable: false,
            });
        }
        if self.addresses.is_empty() {
            return Err(Error::AllocationRequestFailed {
                reason: String::from("pool exhausted"),
                retryable: false,
            });
        }
        Ok(self.addresses.clone())
    }

    async fn release(&self, cluster: &ClusterIdentity, _credential: &Credential, key: &ServiceKey) -> Result<(), Error> {
        self.release_attempts.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.release_failures) {
            return Err(Error::ReleaseFailed {
                reason: String::from("503 Service Unavailable"),
                retryable: true,
            });
        }
        self.releases.lock().unwrap().push((cluster.clone(), key.clone()));
        Ok(())
    }
}

/// Service store backed by a map, patches are applied to the stored objects
#[derive(Default)]
pub struct MockServiceStore {
    services: Mutex<HashMap<ServiceKey, Service>>,
    patches: Mutex<Vec<(ServiceKey, Vec<String>)>>,
    spec_conflicts: AtomicUsize,
    status_conflicts: AtomicUsize,
}

impl MockServiceStore {
    pub fn with_services(services: Vec<Service>) -> Self {
        let store = Self::default();
        for service in services {
            store.insert(service);
        }
        store
    }

    /// Rejects the next `count` `spec.externalIPs` patches with a 409
    pub fn conflicting_spec_patches(self, count: usize) -> Self {
        self.spec_conflicts.store(count, Ordering::SeqCst);
        self
    }

    /// Rejects the next `count` status patches with a 409
    pub fn conflicting_status_patches(self, count: usize) -> Self {
        self.status_conflicts.store(count, Ordering::SeqCst);
        self
    }

    pub fn insert(&self, service: Service) {
        let key = ServiceKey::from_service(&service).expect("Test service without key");
        self.services.lock().unwrap().insert(key, service);
    }

    pub fn service(&self, key: &ServiceKey) -> Option<Service> {
        self.services.lock().unwrap().get(key).cloned()
    }

    pub fn patches(&self) -> Vec<(ServiceKey, Vec<String>)> {
        self.patches.lock().unwrap().clone()
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| remaining.checked_sub(1))
        .is_ok()
}

fn conflict() -> Error {
    Error::PatchConflict(kube::Error::Api(ErrorResponse {
        status: String::from("Failure"),
        message: String::from("the object has been modified"),
        reason: String::from("Conflict"),
        code: 409,
    }))
}

#[async_trait]
impl ServiceStore for MockServiceStore {
    async fn get(&self, key: &ServiceKey) -> Result<Option<Service>, Error> {
        Ok(self.service(key))
    }

    async fn assign_addresses(&self, key: &ServiceKey, addresses: &[String], publish_status: bool) -> Result<(), Error> {
        if take_failure(&self.spec_conflicts) {
            return Err(conflict());
        }
        self.patches.lock().unwrap().push((key.clone(), addresses.to_vec()));
        if let Some(service) = self.services.lock().unwrap().get_mut(key) {
            service.spec.get_or_insert_with(Default::default).external_ips = Some(addresses.to_vec());
        }
        if publish_status {
            self.publish_ingress(key, addresses).await?;
        }
        Ok(())
    }

    async fn publish_ingress(&self, key: &ServiceKey, addresses: &[String]) -> Result<(), Error> {
        if take_failure(&self.status_conflicts) {
            return Err(conflict());
        }
        if let Some(service) = self.services.lock().unwrap().get_mut(key) {
            service.status = Some(ServiceStatus {
                load_balancer: Some(LoadBalancerStatus {
                    ingress: Some(addresses.iter()
                        .map(|ip| LoadBalancerIngress { ip: Some(ip.clone()), ..Default::default() })
                        .collect()),
                }),
                ..Default::default()
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingDispatcher {
    tasks: Mutex<Vec<ReleaseTask>>,
}

impl RecordingDispatcher {
    pub fn tasks(&self) -> Vec<ReleaseTask> {
        self.tasks.lock().unwrap().clone()
    }
}

impl ReleaseDispatcher for RecordingDispatcher {
    fn dispatch(&self, task: ReleaseTask) {
        self.tasks.lock().unwrap().push(task);
    }
}
