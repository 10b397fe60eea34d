use std::{
    any::Any,
    collections::HashSet,
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use anyhow::{Context, Result};
use futures_util::FutureExt;
use thiserror::Error;
use tokio::{
    sync::{
        OwnedSemaphorePermit, Semaphore,
        mpsc::{self, error::TrySendError},
    },
    task::{JoinError, JoinSet},
};
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use super::recording_pipeline::RecordingPipelineUseCase;
use crate::domain::{
    repositories::recording_state::RecordingStateRepository,
    value_objects::{
        recording_jobs::{QueuedResponse, RecordingJob},
        recording_pipeline::PipelineStage,
    },
};

pub const DEFAULT_MAX_CONCURRENT_RUNS: usize = 8;
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub max_concurrent_runs: usize,
    pub queue_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: DEFAULT_MAX_CONCURRENT_RUNS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnqueueError {
    #[error("ingestion queue is full")]
    QueueFull,
    #[error("ingestion queue is closed")]
    Closed,
}

/// Call ids that are queued or running.
#[derive(Default)]
struct InFlightRegistry {
    calls: Mutex<HashSet<Uuid>>,
}

impl InFlightRegistry {
    fn claim(self: &Arc<Self>, call_id: Uuid) -> Option<InFlightClaim> {
        self.lock().insert(call_id).then(|| InFlightClaim {
            registry: Arc::clone(self),
            call_id,
        })
    }

    fn contains(&self, call_id: &Uuid) -> bool {
        self.lock().contains(call_id)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<Uuid>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds a call id in the registry until dropped, whether the run finished,
/// panicked, or never left the queue.
struct InFlightClaim {
    registry: Arc<InFlightRegistry>,
    call_id: Uuid,
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.call_id);
    }
}

struct QueuedJob {
    job: RecordingJob,
    claim: InFlightClaim,
}

/// Admission side of the scheduler. Never blocks the caller on a run.
pub struct RecordingIngestionUseCase {
    sender: mpsc::Sender<QueuedJob>,
    in_flight: Arc<InFlightRegistry>,
    state: Arc<dyn RecordingStateRepository + Send + Sync>,
}

/// Execution side: pulls jobs off the queue and runs them under a
/// concurrency ceiling.
pub struct IngestionDispatcher {
    receiver: mpsc::Receiver<QueuedJob>,
    pipeline: Arc<RecordingPipelineUseCase>,
    state: Arc<dyn RecordingStateRepository + Send + Sync>,
    permits: Arc<Semaphore>,
    max_concurrent_runs: usize,
}

impl RecordingIngestionUseCase {
    pub fn new(
        pipeline: Arc<RecordingPipelineUseCase>,
        state: Arc<dyn RecordingStateRepository + Send + Sync>,
        config: SchedulerConfig,
    ) -> (Self, IngestionDispatcher) {
        let max_concurrent_runs = config.max_concurrent_runs.max(1);
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));

        let usecase = Self {
            sender,
            in_flight: Arc::new(InFlightRegistry::default()),
            state: Arc::clone(&state),
        };
        let dispatcher = IngestionDispatcher {
            receiver,
            pipeline,
            state,
            permits: Arc::new(Semaphore::new(max_concurrent_runs)),
            max_concurrent_runs,
        };

        (usecase, dispatcher)
    }

    /// Queues a run for `job`. A call that is already queued, running or
    /// completed is acknowledged without starting a second run.
    pub async fn enqueue(&self, job: RecordingJob) -> Result<QueuedResponse, EnqueueError> {
        let Some(claim) = self.in_flight.claim(job.call_id) else {
            info!(
                call_id = %job.call_id,
                call_sid = %job.call_sid,
                "recording_ingestion: call already queued or running; skipping"
            );
            return Ok(QueuedResponse { queued: true });
        };

        // Reserve before writing `queued` so a full queue leaves no stale row.
        let slot = match self.sender.try_reserve() {
            Ok(slot) => slot,
            Err(TrySendError::Full(())) => {
                warn!(
                    call_id = %job.call_id,
                    "recording_ingestion: queue full; rejecting job"
                );
                return Err(EnqueueError::QueueFull);
            }
            Err(TrySendError::Closed(())) => {
                error!(
                    call_id = %job.call_id,
                    "recording_ingestion: dispatcher stopped; rejecting job"
                );
                return Err(EnqueueError::Closed);
            }
        };

        match self
            .state
            .mark_queued(job.call_id, job.call_sid.clone())
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                info!(
                    call_id = %job.call_id,
                    call_sid = %job.call_sid,
                    "recording_ingestion: recording already completed; skipping"
                );
                return Ok(QueuedResponse { queued: true });
            }
            Err(err) => {
                error!(
                    call_id = %job.call_id,
                    error = %format!("{err:#}"),
                    "recording_ingestion: failed to mark recording queued"
                );
            }
        }

        info!(
            call_id = %job.call_id,
            call_sid = %job.call_sid,
            "recording_ingestion: job queued"
        );
        slot.send(QueuedJob { job, claim });

        Ok(QueuedResponse { queued: true })
    }

    pub fn is_in_flight(&self, call_id: &Uuid) -> bool {
        self.in_flight.contains(call_id)
    }
}

impl IngestionDispatcher {
    /// Runs until every `RecordingIngestionUseCase` handle is dropped, then
    /// waits for the remaining runs.
    pub async fn run(mut self) -> Result<()> {
        info!(
            max_concurrent_runs = self.max_concurrent_runs,
            "recording_ingestion: dispatcher started"
        );
        let mut runs = JoinSet::new();

        loop {
            tokio::select! {
                queued = self.receiver.recv() => {
                    let Some(queued) = queued else { break };
                    let permit = Arc::clone(&self.permits)
                        .acquire_owned()
                        .await
                        .context("ingestion semaphore closed")?;
                    runs.spawn(supervise(
                        Arc::clone(&self.pipeline),
                        Arc::clone(&self.state),
                        queued,
                        permit,
                    ));
                }
                Some(joined) = runs.join_next(), if !runs.is_empty() => log_joined(joined),
            }
        }

        info!(
            remaining_runs = runs.len(),
            "recording_ingestion: queue closed; draining runs"
        );
        while let Some(joined) = runs.join_next().await {
            log_joined(joined);
        }
        info!("recording_ingestion: dispatcher stopped");

        Ok(())
    }
}

async fn supervise(
    pipeline: Arc<RecordingPipelineUseCase>,
    state: Arc<dyn RecordingStateRepository + Send + Sync>,
    queued: QueuedJob,
    _permit: OwnedSemaphorePermit,
) -> PipelineStage {
    let QueuedJob { job, claim } = queued;
    let span = info_span!(
        "recording_ingestion",
        call_id = %job.call_id,
        call_sid = %job.call_sid
    );

    let outcome = AssertUnwindSafe(pipeline.run(&job))
        .catch_unwind()
        .instrument(span.clone())
        .await;

    let stage = match outcome {
        Ok(stage) => stage,
        Err(panic) => {
            let message = format!("ingestion run panicked: {}", panic_message(panic.as_ref()));
            error!(parent: &span, error = %message, "recording_ingestion: run panicked");
            if let Err(err) = state.mark_failed(job.call_id, message).await {
                error!(
                    parent: &span,
                    error = %format!("{err:#}"),
                    "recording_ingestion: failed to mark panicked run failed"
                );
            }
            PipelineStage::Failed
        }
    };

    drop(claim);
    stage
}

fn log_joined(joined: Result<PipelineStage, JoinError>) {
    if let Err(err) = joined {
        error!(error = %err, "recording_ingestion: run task aborted");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
