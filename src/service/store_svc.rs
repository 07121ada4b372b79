use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use serde_json::json;

use crate::core::error::Error;
use crate::model::key::ServiceKey;

/// Read and write access to the watched Service objects
#[async_trait]
pub trait ServiceStore: Send + Sync {
    /// `None` when the service no longer exists
    async fn get(&self, key: &ServiceKey) -> Result<Option<Service>, Error>;

    /// Writes `spec.externalIPs`, then the status ingress when `publish_status` is set
    async fn assign_addresses(&self, key: &ServiceKey, addresses: &[String], publish_status: bool) -> Result<(), Error>;

    async fn publish_ingress(&self, key: &ServiceKey, addresses: &[String]) -> Result<(), Error>;
}

pub struct KubeServiceStore {
    client: Client,
}

impl KubeServiceStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn services(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ServiceStore for KubeServiceStore {
    async fn get(&self, key: &ServiceKey) -> Result<Option<Service>, Error> {
        self.services(&key.namespace)
            .get_opt(&key.name)
            .await
            .map_err(Error::ServiceLookupFailed)
    }

    async fn assign_addresses(&self, key: &ServiceKey, addresses: &[String], publish_status: bool) -> Result<(), Error> {
        self.services(&key.namespace)
            .patch(&key.name, &PatchParams::default(), &Patch::Merge(&external_ips_patch(addresses)))
            .await
            .map_err(patch_error)?;

        if publish_status {
            self.publish_ingress(key, addresses).await?;
        }
        Ok(())
    }

    async fn publish_ingress(&self, key: &ServiceKey, addresses: &[String]) -> Result<(), Error> {
        self.services(&key.namespace)
            .patch_status(&key.name, &PatchParams::default(), &Patch::Merge(&ingress_status_patch(addresses)))
            .await
            .map_err(patch_error)?;
        Ok(())
    }
}

pub fn external_ips_patch(addresses: &[String]) -> serde_json::Value {
    json!({
        "spec": {
            "externalIPs": addresses
        }
    })
}

pub fn ingress_status_patch(addresses: &[String]) -> serde_json::Value {
    let ingress = addresses.iter()
        .map(|ip| json!({ "ip": ip }))
        .collect::<Vec<_>>();
    json!({
        "status": {
            "loadBalancer": {
                "ingress": ingress
            }
        }
    })
}

fn patch_error(err: kube::Error) -> Error {
    match err {
        kube::Error::Api(response) if response.code == 409 => Error::PatchConflict(kube::Error::Api(response)),
        other => Error::ServicePatchFailed(other),
    }
}
