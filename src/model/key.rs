use std::fmt::{Display, Formatter};

use k8s_openapi::api::core::v1::Service;

use crate::core::error::Error;

/// Identifies a reconcile target, the only payload guaranteed on deletion
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    pub namespace: String,
    pub name: String,
}

impl ServiceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn from_service(service: &Service) -> Result<Self, Error> {
        let namespace = service.metadata.namespace.as_ref()
            .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
        let name = service.metadata.name.as_ref()
            .ok_or(Error::MissingObjectKey(".metadata.name"))?;
        Ok(Self::new(namespace, name))
    }

    /// Path segment the allocation service uses for a single service
    pub fn allocator_id(&self) -> String {
        format!("{}:{}", self.namespace, self.name)
    }
}

impl Display for ServiceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
