use std::collections::BTreeSet;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};

use crate::core::error::Error;
use crate::model::identity::ClusterIdentity;

/// Cluster member inventory the identity is derived from
#[async_trait]
pub trait NodeInventory: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<Node>, Error>;
}

pub struct KubeNodeInventory {
    nodes_api: Api<Node>,
}

impl KubeNodeInventory {
    pub fn new(client: Client) -> Self {
        Self {
            nodes_api: Api::all(client),
        }
    }
}

#[async_trait]
impl NodeInventory for KubeNodeInventory {
    async fn list_nodes(&self) -> Result<Vec<Node>, Error> {
        let nodes = self.nodes_api.list(&ListParams::default()).await
            .map_err(Error::NodeListFailed)?;
        Ok(nodes.items)
    }
}

pub struct ClusterIdentityResolver<N> {
    inventory: N,
    control_plane_labels: Vec<String>,
    cluster_id_label: String,
}

impl<N: NodeInventory> ClusterIdentityResolver<N> {
    pub fn new(inventory: N, control_plane_labels: Vec<String>, cluster_id_label: impl Into<String>) -> Self {
        Self {
            inventory,
            control_plane_labels,
            cluster_id_label: cluster_id_label.into(),
        }
    }

    /// Lists nodes on every call, membership may change between reconciles
    pub async fn resolve(&self) -> Result<ClusterIdentity, Error> {
        let nodes = self.inventory.list_nodes().await?;
        Ok(select_cluster_identity(&nodes, &self.control_plane_labels, &self.cluster_id_label))
    }
}

/// Picks the identity label of control-plane nodes.
///
/// When several control-plane nodes disagree the lexicographically smallest
/// value wins. Returns an unresolved identity when no node qualifies.
pub fn select_cluster_identity(nodes: &[Node], control_plane_labels: &[String], cluster_id_label: &str) -> ClusterIdentity {
    let candidates = nodes.iter()
        .filter(|node| {
            let labels = node.labels();
            control_plane_labels.iter().any(|role| labels.contains_key(role))
        })
        .flat_map(|node| node.labels().get(cluster_id_label))
        .filter(|id| !id.is_empty())
        .collect::<BTreeSet<_>>();

    if candidates.len() > 1 {
        log::warn!("Control-plane nodes carry conflicting '{cluster_id_label}' labels {candidates:?}, using the smallest");
    }

    candidates.into_iter()
        .next()
        .map(|id| ClusterIdentity::new(id.as_str()))
        .unwrap_or_else(ClusterIdentity::unresolved)
}
