//! Worker task loop
//!
//! A worker owns a private job channel. Each turn it publishes a ticket (the
//! sending half of that channel) into the pool's availability queue, then waits
//! for either a job or the stop signal. One ticket per worker is ever queued,
//! so the queue never holds more than `max_workers` entries.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::job::{BoxedJob, Job, JobError};

/// Endpoint through which a submitter hands a job to one idle worker
pub(crate) type Ticket = mpsc::Sender<BoxedJob>;

/// Stop flag and availability queue, guarded together
///
/// Workers take the read lock while registering; `stop` takes the write lock,
/// so no ticket is enqueued after the flag is set.
pub(crate) struct Registration {
    pub(crate) stopped: bool,
    pub(crate) tickets: Option<mpsc::Sender<Ticket>>,
}

pub(crate) struct Worker {
    pub(crate) index: usize,
    pub(crate) pool_id: Arc<str>,
    pub(crate) registration: Arc<RwLock<Registration>>,
    pub(crate) shutdown: CancellationToken,
}

impl Worker {
    pub(crate) async fn run(self) {
        let (ticket, mut jobs) = mpsc::channel::<BoxedJob>(1);
        debug!(pool_id = %self.pool_id, worker = self.index, "Worker started");

        loop {
            if !self.register(&ticket) {
                break;
            }

            // A job already handed over wins against the stop signal.
            tokio::select! {
                biased;
                job = jobs.recv() => match job {
                    Some(job) => self.execute(job).await,
                    None => break,
                },
                _ = self.shutdown.cancelled() => break,
            }
        }

        // Jobs handed over while the stop signal was firing still run.
        jobs.close();
        while let Ok(job) = jobs.try_recv() {
            self.execute(job).await;
        }

        debug!(pool_id = %self.pool_id, worker = self.index, "Worker exited");
    }

    /// Publish this worker's ticket; false once the pool is stopped
    fn register(&self, ticket: &Ticket) -> bool {
        let registration = self.registration.read();
        if registration.stopped {
            return false;
        }
        match &registration.tickets {
            // Capacity equals the worker count, so this only fails when closed.
            Some(tickets) => tickets.try_send(ticket.clone()).is_ok(),
            None => false,
        }
    }

    async fn execute(&self, mut job: BoxedJob) {
        if let Err(err) = job.context().check() {
            report_job_error(&self.pool_id, job.as_ref(), &err);
            return;
        }

        let result = match AssertUnwindSafe(job.execute()).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(JobError::from_panic(payload)),
        };

        if let Err(err) = result {
            report_job_error(&self.pool_id, job.as_ref(), &err);
        }
    }
}

/// Log a failure against the job's name, inside the job's span
pub(crate) fn report_job_error(pool_id: &str, job: &dyn Job, err: &dyn std::fmt::Display) {
    error!(
        parent: job.context().span(),
        pool_id = %pool_id,
        job_name = job.name(),
        error = %err,
        "worker job error"
    );
}
