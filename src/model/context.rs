use std::time::Duration;

use crate::core::retry::RetryPolicy;
use crate::service::reconciler_svc::LoadBalancerReconciler;

pub struct ContextData {
    /// State machine shared by the controller and the deletion watcher
    pub reconciler: LoadBalancerReconciler,
    /// Requeue delay after a failed reconcile
    pub error_requeue: Duration,
    /// Deletions have no controller requeue, they are retried in place
    pub deletion_retry: RetryPolicy,
    pub deletion_concurrency: usize,
}
