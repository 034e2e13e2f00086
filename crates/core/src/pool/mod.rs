//! Bounded worker pool
//!
//! This module provides:
//! - [`WorkerPool`] - Fixed set of workers with timeout-bounded submission
//! - [`Job`] - The unit of work contract, with [`FnJob`] as a closure adapter
//! - [`JobContext`] - Cancellation, deadline and log span of a submission
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        WorkerPool                             │
//! │                                                               │
//! │   submit(job, timeout)                                        │
//! │        │                                                      │
//! │        ▼   races: ticket  |  timeout  |  stop signal          │
//! │  ┌──────────────────────────────────────────────────────┐     │
//! │  │   availability queue (one ticket per idle worker)    │     │
//! │  └──────────────────────────────────────────────────────┘     │
//! │        │ ticket = worker's private job channel                │
//! │        ▼                                                      │
//! │  [Worker 1] [Worker 2] [Worker 3] ... [Worker N]              │
//! │     execute → log failures/panics → re-publish ticket         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! An empty queue means every worker is busy, so `submit` waits; that wait is
//! the pool's backpressure.

mod dispatcher;
mod job;
mod worker;

pub use dispatcher::{
    PoolError, WorkerPool, WorkerPoolConfig, WorkerPoolStatus, DEFAULT_MAX_WORKERS,
    MAX_WORKERS_LIMIT,
};
pub use job::{BoxedJob, FnJob, Job, JobContext, JobError};
pub(crate) use job::panic_message;
