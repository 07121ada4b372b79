use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Cannot read credential from '{}' - {source}", path.display())]
    CredentialUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Credential at '{}' is empty", path.display())]
    CredentialEmpty { path: PathBuf },
    #[error("Cluster identity unresolved")]
    ClusterIdentityUnresolved,
    #[error("Allocation request failed - {reason}")]
    AllocationRequestFailed { reason: String, retryable: bool },
    #[error("Allocation response invalid - {0}")]
    AllocationResponseInvalid(String),
    #[error("Conflicting modification while patching service: {0}")]
    PatchConflict(#[source] kube::Error),
    #[error("Release failed - {reason}")]
    ReleaseFailed { reason: String, retryable: bool },
    #[error("Failed to read Service: {0}")]
    ServiceLookupFailed(#[source] kube::Error),
    #[error("Failed to patch Service: {0}")]
    ServicePatchFailed(#[source] kube::Error),
    #[error("Failed to list Nodes: {0}")]
    NodeListFailed(#[source] kube::Error),
    #[error("MissingObjectKey: {0}")]
    MissingObjectKey(&'static str),
}

impl Error {
    /// Whether a later attempt of the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::AllocationRequestFailed { retryable, .. }
            | Error::ReleaseFailed { retryable, .. } => *retryable,
            Error::CredentialUnavailable { .. }
            | Error::CredentialEmpty { .. }
            | Error::PatchConflict(_)
            | Error::ServiceLookupFailed(_)
            | Error::ServicePatchFailed(_)
            | Error::NodeListFailed(_) => true,
            Error::ClusterIdentityUnresolved
            | Error::AllocationResponseInvalid(_)
            | Error::MissingObjectKey(_) => false,
        }
    }
}
