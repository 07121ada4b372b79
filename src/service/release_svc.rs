use std::fmt::Display;
use std::sync::Arc;

use metrics::counter;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::core::error::Error;
use crate::core::retry::{retry_with_backoff, RetryPolicy};
use crate::model::identity::ClusterIdentity;
use crate::model::key::ServiceKey;
use crate::service::allocation_svc::AllocationApi;
use crate::service::context_svc::ContextProvider;

pub const RELEASE_METRIC_NAME: &str = "lbip_releases_total";

/// Release request for one service.
///
/// Carries no credential: workers read a fresh one for every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseTask {
    pub cluster: ClusterIdentity,
    pub key: ServiceKey,
}

impl ReleaseTask {
    pub fn new(cluster: ClusterIdentity, key: ServiceKey) -> Self {
        Self { cluster, key }
    }
}

pub trait ReleaseDispatcher: Send + Sync {
    /// Never blocks, the outcome is reported by the release path itself
    fn dispatch(&self, task: ReleaseTask);
}

#[derive(Debug, Clone)]
pub struct ReleaseSettings {
    pub workers: usize,
    pub capacity: usize,
    pub retry: RetryPolicy,
}

/// Bounded queue of release tasks drained by a fixed worker pool.
/// Tasks that cannot be queued or exhaust their retries are dead-lettered.
#[derive(Clone)]
pub struct ReleaseQueue {
    sender: mpsc::Sender<ReleaseTask>,
}

/// What the workers did until the queue was closed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReleaseReport {
    pub released: Vec<ServiceKey>,
    pub dead_letters: Vec<ServiceKey>,
}

impl ReleaseReport {
    fn merge(mut self, other: ReleaseReport) -> Self {
        self.released.extend(other.released);
        self.dead_letters.extend(other.dead_letters);
        self
    }
}

pub struct ReleaseWorkers {
    handles: Vec<JoinHandle<ReleaseReport>>,
}

impl ReleaseWorkers {
    /// Resolves once every `ReleaseQueue` handle has been dropped and the queue is drained
    pub async fn join(self) -> ReleaseReport {
        futures::future::join_all(self.handles).await
            .into_iter()
            .fold(ReleaseReport::default(), |acc, res| match res {
                Ok(report) => acc.merge(report),
                Err(err) => {
                    log::error!("Release worker terminated abnormally - {err}");
                    acc
                }
            })
    }
}

impl ReleaseQueue {
    pub fn start(
        context: Arc<dyn ContextProvider>,
        allocator: Arc<dyn AllocationApi>,
        settings: ReleaseSettings,
    ) -> (Self, ReleaseWorkers) {
        let (sender, receiver) = mpsc::channel(settings.capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let handles = (0..settings.workers.max(1))
            .map(|worker_id| tokio::spawn(run_worker(
                worker_id,
                receiver.clone(),
                context.clone(),
                allocator.clone(),
                settings.retry.clone(),
            )))
            .collect();

        (Self { sender }, ReleaseWorkers { handles })
    }
}

impl ReleaseDispatcher for ReleaseQueue {
    fn dispatch(&self, task: ReleaseTask) {
        match self.sender.try_send(task) {
            Ok(()) => counter!(RELEASE_METRIC_NAME, "outcome" => "queued").increment(1),
            Err(TrySendError::Full(task)) => dead_letter(&task, "release queue is full"),
            Err(TrySendError::Closed(task)) => dead_letter(&task, "release queue is closed"),
        }
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<ReleaseTask>>>,
    context: Arc<dyn ContextProvider>,
    allocator: Arc<dyn AllocationApi>,
    retry: RetryPolicy,
) -> ReleaseReport {
    let mut report = ReleaseReport::default();

    loop {
        let next = receiver.lock().await.recv().await;
        let Some(task) = next else {
            break;
        };

        let outcome = retry_with_backoff(&retry, "release", Error::is_retryable, || {
            release(context.as_ref(), allocator.as_ref(), &task)
        }).await;

        match outcome {
            Ok(()) => {
                log::info!("Released public IP of Service {} in cluster '{}'", task.key, task.cluster);
                counter!(RELEASE_METRIC_NAME, "outcome" => "released").increment(1);
                report.released.push(task.key);
            }
            Err(err) => {
                dead_letter(&task, err);
                report.dead_letters.push(task.key);
            }
        }
    }

    log::debug!("Release worker {worker_id} stopped");
    report
}

async fn release(context: &dyn ContextProvider, allocator: &dyn AllocationApi, task: &ReleaseTask) -> Result<(), Error> {
    let credential = context.credential().await?;
    allocator.release(&task.cluster, &credential, &task.key).await
}

fn dead_letter(task: &ReleaseTask, reason: impl Display) {
    log::error!(
        "Dead letter: release of Service {} in cluster '{}' abandoned, manual release required - {reason}",
        task.key,
        task.cluster
    );
    counter!(RELEASE_METRIC_NAME, "outcome" => "dead_letter").increment(1);
}
