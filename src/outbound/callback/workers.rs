use crate::domain::models::CallbackPayload;
use crate::domain::ports::{CallbackScheduler, SchedulerError};
use crate::outbound::callback::dispatcher::CallbackDispatcher;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// A callback waiting to be delivered
#[derive(Debug, Clone, PartialEq)]
struct DeliveryJob {
    url: String,
    payload: CallbackPayload,
}

/// What happened to in-flight deliveries during shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Deliveries that finished while draining.
    pub drained: usize,

    /// Deliveries aborted when the grace period ran out.
    pub abandoned: usize,
}

/// Runs callback deliveries as supervised background tasks.
///
/// `DeliveryWorkers` owns a supervisor task started with
/// [`DeliveryWorkers::start`]. Each scheduled callback becomes its own task in
/// a `JoinSet`, so deliveries for different documents run concurrently and
/// never block the request that scheduled them.
///
/// [`DeliveryWorkers::shutdown`] stops intake, waits up to the grace period
/// for in-flight deliveries and aborts whatever is still running.
pub struct DeliveryWorkers {
    jobs: mpsc::UnboundedSender<DeliveryJob>,

    shutdown: watch::Sender<bool>,

    supervisor: Mutex<Option<JoinHandle<ShutdownReport>>>,
}

impl DeliveryWorkers {
    /// Spawn the supervisor onto the current tokio runtime.
    pub fn start(dispatcher: CallbackDispatcher, shutdown_grace: Duration) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            max_attempts = dispatcher.policy().max_attempts(),
            shutdown_grace_ms = shutdown_grace.as_millis() as u64,
            "Callback delivery workers starting"
        );

        let supervisor = tokio::spawn(supervise(
            Arc::new(dispatcher),
            jobs_rx,
            shutdown_rx,
            shutdown_grace,
        ));

        Self {
            jobs: jobs_tx,
            shutdown: shutdown_tx,
            supervisor: Mutex::new(Some(supervisor)),
        }
    }

    /// Stop accepting deliveries and drain the ones in flight.
    ///
    /// Calling this more than once is harmless; later calls report nothing.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.shutdown.send_replace(true);

        let Some(supervisor) = self.supervisor.lock().await.take() else {
            return ShutdownReport::default();
        };

        match supervisor.await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Callback supervisor task failed");
                ShutdownReport::default()
            }
        }
    }
}

impl CallbackScheduler for DeliveryWorkers {
    fn schedule(&self, url: String, payload: CallbackPayload) -> Result<(), SchedulerError> {
        if *self.shutdown.borrow() {
            return Err(SchedulerError::Closed);
        }

        debug!(request_id = %payload.request_id, "Queueing callback delivery");
        self.jobs
            .send(DeliveryJob { url, payload })
            .map_err(|_| SchedulerError::Closed)
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

async fn supervise(
    dispatcher: Arc<CallbackDispatcher>,
    mut jobs: mpsc::UnboundedReceiver<DeliveryJob>,
    mut shutdown: watch::Receiver<bool>,
    grace: Duration,
) -> ShutdownReport {
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            job = jobs.recv() => match job {
                Some(job) => spawn_delivery(&mut tasks, &dispatcher, job),
                None => break,
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_join(joined),
        }
    }

    // Jobs accepted before intake closed still get their chance.
    jobs.close();
    while let Ok(job) = jobs.try_recv() {
        spawn_delivery(&mut tasks, &dispatcher, job);
    }

    info!(in_flight = tasks.len(), "Draining callback deliveries");

    let mut report = ShutdownReport::default();
    let drained = tokio::time::timeout(grace, async {
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
            report.drained += 1;
        }
    })
    .await;

    if drained.is_err() {
        report.abandoned = tasks.len();
        warn!(
            abandoned = report.abandoned,
            "Shutdown grace period elapsed – aborting callback deliveries"
        );
        tasks.shutdown().await;
    }

    info!(
        drained = report.drained,
        abandoned = report.abandoned,
        "Callback delivery workers stopped"
    );
    report
}

fn spawn_delivery(
    tasks: &mut JoinSet<()>,
    dispatcher: &Arc<CallbackDispatcher>,
    job: DeliveryJob,
) {
    let dispatcher = dispatcher.clone();
    tasks.spawn(async move {
        let request_id = job.payload.request_id.clone();

        match dispatcher.deliver(&job.url, &job.payload).await {
            Ok(report) => info!(
                request_id = %request_id,
                attempts = report.attempts,
                status_code = report.status_code,
                "Callback delivered"
            ),
            Err(e) => error!(
                request_id = %request_id,
                error = %e,
                "Callback delivery failed"
            ),
        }
    });
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined
        && e.is_panic()
    {
        error!(error = %e, "Callback delivery task panicked");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
