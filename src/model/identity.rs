use std::fmt::{Display, Formatter};

/// Identifier the allocation service uses to scope requests to this cluster.
///
/// An empty identity means no control-plane node carried the identity label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterIdentity(String);

impl ClusterIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn unresolved() -> Self {
        Self::default()
    }

    pub fn is_unresolved(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ClusterIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
