//! Units of work accepted by the worker pool

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Span;

/// Error produced while executing a job
///
/// Execution errors never reach the submitter; the worker logs them against the
/// job's name and context.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The job body returned an error
    #[error(transparent)]
    Failed(#[from] anyhow::Error),

    /// The job body panicked; the worker survived
    #[error("job panicked: {0}")]
    Panicked(String),

    /// The job's context was cancelled before a worker picked it up
    #[error("job context was cancelled before execution")]
    Cancelled,

    /// The job's deadline passed before a worker picked it up
    #[error("job deadline exceeded before execution")]
    DeadlineExceeded,
}

impl JobError {
    /// Build an error from a panic payload
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        Self::Panicked(panic_message(payload.as_ref()))
    }
}

/// Readable text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Cancellation and deadline carrier associated with a submission
///
/// The span is the parent of every log line the pool writes about the job, so
/// failures show up inside the submitter's trace.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use switchyard_core::pool::JobContext;
///
/// let parent = JobContext::background();
/// let ctx = parent.child().with_timeout(Duration::from_secs(5));
///
/// parent.cancel();
/// assert!(ctx.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct JobContext {
    token: CancellationToken,
    deadline: Option<Instant>,
    span: Span,
}

impl Default for JobContext {
    fn default() -> Self {
        Self::background()
    }
}

impl JobContext {
    /// Context that is never cancelled and logs without a parent span
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            span: Span::none(),
        }
    }

    /// Context bound to the caller's current span
    pub fn current() -> Self {
        Self {
            span: Span::current(),
            ..Self::background()
        }
    }

    /// Context driven by an existing token
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            ..Self::background()
        }
    }

    /// Derive a context that is cancelled together with this one
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            span: self.span.clone(),
        }
    }

    /// Set an absolute deadline
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline relative to now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Attach the span used as parent for log lines about this job
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves when the context is cancelled or its deadline passes
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Why the context is done, if it is
    pub(crate) fn check(&self) -> Result<(), JobError> {
        if self.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        if self.is_expired() {
            return Err(JobError::DeadlineExceeded);
        }
        Ok(())
    }
}

/// A named unit of work
///
/// Callers that need the outcome carry their own result channel inside the
/// job; the pool only reports whether the job was handed to a worker.
#[async_trait]
pub trait Job: Send + 'static {
    /// Identifier used in diagnostics
    fn name(&self) -> &str;

    /// Run the work
    async fn execute(&mut self) -> Result<(), JobError>;

    /// Context of the submission
    fn context(&self) -> &JobContext;
}

/// Boxed job as stored by the pool
pub type BoxedJob = Box<dyn Job>;

type JobFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Job backed by a closure
///
/// # Example
///
/// ```
/// use switchyard_core::pool::{FnJob, JobContext};
///
/// let job = FnJob::new("send-welcome-email", JobContext::background(), || async {
///     // deliver the email...
///     Ok(())
/// });
/// ```
pub struct FnJob {
    name: String,
    context: JobContext,
    run: Option<Box<dyn FnOnce() -> JobFuture + Send>>,
}

impl FnJob {
    pub fn new<F, Fut>(name: impl Into<String>, context: JobContext, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            context,
            run: Some(Box::new(move || Box::pin(f()))),
        }
    }

    /// Box the job for submission
    pub fn boxed(self) -> BoxedJob {
        Box::new(self)
    }
}

impl fmt::Debug for FnJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnJob")
            .field("name", &self.name)
            .field("context", &self.context)
            .field("consumed", &self.run.is_none())
            .finish()
    }
}

#[async_trait]
impl Job for FnJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&mut self) -> Result<(), JobError> {
        let run = self
            .run
            .take()
            .ok_or_else(|| JobError::Failed(anyhow::anyhow!("job already executed")))?;
        run().await.map_err(JobError::Failed)
    }

    fn context(&self) -> &JobContext {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_context() {
        let ctx = JobContext::background();
        assert!(!ctx.is_cancelled());
        assert!(!ctx.is_expired());
        assert!(ctx.deadline().is_none());
        assert!(ctx.check().is_ok());
    }

    #[test]
    fn test_child_follows_parent() {
        let parent = JobContext::background();
        let child = parent.child();

        child.cancel();
        assert!(!parent.is_cancelled());

        let other = parent.child();
        parent.cancel();
        assert!(other.is_cancelled());
        assert!(matches!(other.check(), Err(JobError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let ctx = JobContext::background().with_timeout(Duration::from_millis(50));
        assert!(!ctx.is_expired());

        ctx.done().await;

        assert!(ctx.is_expired());
        assert!(matches!(ctx.check(), Err(JobError::DeadlineExceeded)));
    }

    #[test]
    fn test_panic_payloads() {
        let err = JobError::from_panic(Box::new("boom"));
        assert_eq!(err.to_string(), "job panicked: boom");

        let err = JobError::from_panic(Box::new(String::from("owned boom")));
        assert_eq!(err.to_string(), "job panicked: owned boom");

        let err = JobError::from_panic(Box::new(17u8));
        assert_eq!(err.to_string(), "job panicked: unknown panic payload");
    }

    #[tokio::test]
    async fn test_fn_job_runs_once() {
        let mut job = FnJob::new("once", JobContext::background(), || async { Ok(()) });
        assert_eq!(job.name(), "once");

        assert!(job.execute().await.is_ok());
        let second = job.execute().await;
        assert!(matches!(second, Err(JobError::Failed(_))));
    }

    #[tokio::test]
    async fn test_fn_job_error_is_failed() {
        let mut job = FnJob::new("fails", JobContext::background(), || async {
            anyhow::bail!("disk full")
        });

        let err = job.execute().await.unwrap_err();
        assert!(matches!(err, JobError::Failed(_)));
        assert_eq!(err.to_string(), "disk full");
    }
}
