// Worker pool demo command

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;
use switchyard_core::pool::{FnJob, JobContext, PoolError, WorkerPool, WorkerPoolConfig};
use tracing::info;

use crate::output::{print_field, OutputFormat};

#[derive(Debug, Default, Serialize)]
pub struct PoolReport {
    pub pool_id: String,
    pub workers: usize,
    pub jobs: usize,
    pub accepted: usize,
    pub timed_out: usize,
    pub closed: usize,
    pub executed: usize,
    pub elapsed_ms: u128,
}

pub async fn run(
    output: OutputFormat,
    workers: usize,
    jobs: usize,
    timeout_ms: u64,
    work_ms: u64,
) -> Result<()> {
    let config = WorkerPoolConfig::from_env()
        .context("Failed to read pool configuration")?
        .with_max_workers(workers);
    let pool = Arc::new(WorkerPool::new(config));
    pool.start().await.context("Failed to start worker pool")?;

    let timeout = Duration::from_millis(timeout_ms);
    let work = Duration::from_millis(work_ms);
    let executed = Arc::new(AtomicUsize::new(0));
    let started = Instant::now();

    let submissions = (0..jobs).map(|i| {
        let pool = Arc::clone(&pool);
        let executed = Arc::clone(&executed);
        let job = FnJob::new(format!("sleep-{i}"), JobContext::current(), move || async move {
            tokio::time::sleep(work).await;
            executed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        tokio::spawn(async move { pool.submit(job.boxed(), timeout).await })
    });

    let mut report = PoolReport {
        pool_id: pool.pool_id().to_string(),
        workers,
        jobs,
        ..Default::default()
    };
    for result in futures::future::join_all(submissions).await {
        match result.context("Submission task failed")? {
            Ok(()) => report.accepted += 1,
            Err(PoolError::Timeout(_)) => report.timed_out += 1,
            Err(PoolError::Closed) => report.closed += 1,
            Err(other) => return Err(other).context("Unexpected submission error"),
        }
    }

    pool.shutdown(work + Duration::from_secs(5))
        .await
        .context("Worker pool did not shut down")?;

    report.executed = executed.load(Ordering::SeqCst);
    report.elapsed_ms = started.elapsed().as_millis();
    info!(
        pool_id = %report.pool_id,
        accepted = report.accepted,
        timed_out = report.timed_out,
        "Pool run finished"
    );

    if output.is_text() {
        print_field("Pool", &report.pool_id);
        print_field("Workers", &report.workers.to_string());
        print_field("Jobs", &report.jobs.to_string());
        print_field("Accepted", &report.accepted.to_string());
        print_field("Timed out", &report.timed_out.to_string());
        print_field("Closed", &report.closed.to_string());
        print_field("Executed", &report.executed.to_string());
        print_field("Elapsed", &format!("{}ms", report.elapsed_ms));
    } else {
        output.print_value(&report)?;
    }

    Ok(())
}
