use async_trait::async_trait;

use crate::core::error::Error;
use crate::model::credential::Credential;
use crate::model::identity::ClusterIdentity;
use crate::service::credential_svc::FileCredentialProvider;
use crate::service::identity_svc::{ClusterIdentityResolver, NodeInventory};

/// Per-reconcile lookups of process-external state.
///
/// Implementations must not cache: credentials rotate and cluster membership changes.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn credential(&self) -> Result<Credential, Error>;
    async fn cluster_identity(&self) -> Result<ClusterIdentity, Error>;
}

pub struct PlatformContext<N> {
    credentials: FileCredentialProvider,
    identity: ClusterIdentityResolver<N>,
}

impl<N: NodeInventory> PlatformContext<N> {
    pub fn new(credentials: FileCredentialProvider, identity: ClusterIdentityResolver<N>) -> Self {
        Self {
            credentials,
            identity,
        }
    }
}

#[async_trait]
impl<N: NodeInventory> ContextProvider for PlatformContext<N> {
    async fn credential(&self) -> Result<Credential, Error> {
        self.credentials.credential().await
    }

    async fn cluster_identity(&self) -> Result<ClusterIdentity, Error> {
        self.identity.resolve().await
    }
}
