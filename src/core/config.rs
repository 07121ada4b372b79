use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::core::retry::RetryPolicy;

pub const DEFAULT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
pub const DEFAULT_API_BASE_URL: &str = "https://k3sphere.com/api";

pub fn compose_config<'de, CFG: Deserialize<'de>>(external_path: &str, env_prefix: &str) -> Result<CFG, ConfigError> {
    Config::builder()

        // Add in a local configuration file
        .add_source(File::with_name(external_path).required(false))

        // Add in settings from the environment (e.g. LBIP_API_BASE_URL)
        .add_source(
            Environment::with_prefix(env_prefix)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("excluded_namespaces")
                .with_list_parse_key("control_plane_labels")
        )

        .build()?
        .try_deserialize()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    /// Base url of the allocation service, without trailing slash
    pub api_base_url: String,
    /// Location of the bearer credential, re-read on every reconcile
    pub token_path: PathBuf,
    pub excluded_namespaces: Vec<String>,
    /// Node labels marking a control-plane member, any of them qualifies
    pub control_plane_labels: Vec<String>,
    pub cluster_id_label: String,
    /// Also write assigned addresses into `status.loadBalancer.ingress`
    pub publish_status: bool,
    pub request_timeout_secs: u64,
    pub allocate_max_attempts: u32,
    pub release_max_attempts: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub release_workers: usize,
    pub release_queue_capacity: usize,
    /// Deleted services reconciled at the same time
    pub deletion_concurrency: usize,
    pub error_requeue_secs: u64,
    pub metrics_address: SocketAddr,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::from(DEFAULT_API_BASE_URL),
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
            excluded_namespaces: vec![String::from("kube-system")],
            control_plane_labels: vec![
                String::from("node-role.kubernetes.io/master"),
                String::from("node-role.kubernetes.io/control-plane"),
            ],
            cluster_id_label: String::from("cluster-id"),
            publish_status: false,
            request_timeout_secs: 15,
            allocate_max_attempts: 3,
            release_max_attempts: 8,
            retry_initial_delay_ms: 200,
            retry_max_delay_ms: 30_000,
            release_workers: 4,
            release_queue_capacity: 1024,
            deletion_concurrency: 4,
            error_requeue_secs: 60,
            metrics_address: SocketAddr::from(([0, 0, 0, 0], 9090)),
        }
    }
}

impl OperatorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }

    pub fn allocate_retry(&self) -> RetryPolicy {
        self.retry_policy(self.allocate_max_attempts)
    }

    pub fn release_retry(&self) -> RetryPolicy {
        self.retry_policy(self.release_max_attempts)
    }

    fn retry_policy(&self, max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            ..RetryPolicy::default()
        }
    }
}
