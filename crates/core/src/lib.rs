// Switchyard concurrency primitives
//
// This crate provides the coordination building blocks used by the services
// around it: a bounded worker pool, a multicast broadcast channel and one-shot
// signal combinators.
//
// Key design decisions:
// - Every blocking operation is a race between its input and a shutdown token
// - The pool hands out worker tickets instead of sharing one job queue, so a
//   free worker is something a submitter can wait for with a timeout
// - The broadcaster has a single coordinating task that owns the end of the
//   chain; receivers only read published cells
// - Event ids live in an explicit registry handle, never in global state
// - Job failures are logged, never returned to the submitter

pub mod broadcast;
pub mod config;
pub mod event;
pub mod pool;
pub mod signal;

// Logging setup (tracing-subscriber)
pub mod telemetry;

// Re-exports for convenience
pub use broadcast::{BroadcastError, Broadcaster, BroadcasterConfig, Receiver, Transform};
pub use config::{ConfigError, EnvSource, Environment};
pub use event::{Emitter, Event, EventRegistry, Listener};
pub use pool::{
    BoxedJob, FnJob, Job, JobContext, JobError, PoolError, WorkerPool, WorkerPoolConfig,
    WorkerPoolStatus,
};
pub use signal::Signal;
pub use telemetry::{init_telemetry, LogFormat, TelemetryConfig};
