use std::sync::Arc;

use k8s_openapi::api::core::v1::Service;
use kube::runtime::controller::Action;
use kube::ResourceExt;

use crate::core::error::Error;
use crate::model::context::ContextData;

/// Requeues a failed Service after the configured delay
pub fn error_policy(service: Arc<Service>, error: &Error, ctx: Arc<ContextData>) -> Action {
    log::warn!(
        "Reconcile of Service {}/{} failed, requeue in {}s - {error}",
        service.namespace().unwrap_or_default(),
        service.name_any(),
        ctx.error_requeue.as_secs()
    );
    Action::requeue(ctx.error_requeue)
}
