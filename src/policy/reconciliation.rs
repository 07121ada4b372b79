use std::sync::Arc;

use k8s_openapi::api::core::v1::Service;
use kube::runtime::controller::Action;

use crate::core::error::Error;
use crate::model::context::ContextData;
use crate::model::key::ServiceKey;

/// The reconciler that will be called when a Service changes
pub async fn reconcile(service: Arc<Service>, context: Arc<ContextData>) -> Result<Action, Error> {
    // The object in hand may be stale, the state machine reads it again by key
    let key = ServiceKey::from_service(&service)?;
    let outcome = context.reconciler.reconcile(&key).await?;
    log::debug!("Service {key} reconciled - {outcome:?}");

    Ok(Action::await_change())
}
