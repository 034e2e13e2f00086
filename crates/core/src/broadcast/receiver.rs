//! Per-subscriber cursor into the broadcast chain

use std::sync::Arc;

use futures::Stream;
use tokio_util::sync::CancellationToken;

use super::cell::Cell;
use super::BroadcastError;

/// Transform applied to a value by a single [`Receiver::read_with`] call
///
/// Returning an error aborts the read with that error; remaining transforms do
/// not run.
pub type Transform<T> = dyn Fn(T) -> anyhow::Result<T> + Send + Sync;

/// Reads every value written after the receiver was created, in write order
///
/// Cloning a receiver forks the cursor: both copies continue independently
/// from the same position.
pub struct Receiver<T> {
    cursor: Option<Arc<Cell<T>>>,
    shutdown: CancellationToken,
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        Self {
            cursor: self.cursor.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("valid", &self.cursor.is_some())
            .field("closed", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl<T> Receiver<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(cursor: Arc<Cell<T>>, shutdown: CancellationToken) -> Self {
        Self {
            cursor: Some(cursor),
            shutdown,
        }
    }

    /// Wait for the next value
    pub async fn read(&mut self) -> Result<T, BroadcastError> {
        self.read_with(&[]).await
    }

    /// Wait for the next value and pipe it through `handlers` in order
    ///
    /// Transforms work on this receiver's copy only; other receivers still get
    /// the value as written. If a handler fails, its error is returned and the
    /// cursor stays on the same value, so the next read sees it again.
    ///
    /// Once the broadcaster is closed this and every later read fails with
    /// [`BroadcastError::Closed`], even if unread values remain.
    pub async fn read_with(&mut self, handlers: &[&Transform<T>]) -> Result<T, BroadcastError> {
        let Some(cell) = self.cursor.clone() else {
            return Err(BroadcastError::Closed);
        };
        let shutdown = self.shutdown.clone();

        let link = tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            link = cell.wait() => link,
        };

        let Some(link) = link else {
            self.cursor = None;
            return Err(BroadcastError::Closed);
        };

        let mut value = link.value;
        for handler in handlers {
            value = handler(value).map_err(BroadcastError::Handler)?;
        }

        self.cursor = Some(link.next);
        Ok(value)
    }

    /// Check whether a value is ready to be read without waiting
    pub fn has_pending(&self) -> bool {
        !self.shutdown.is_cancelled()
            && self.cursor.as_ref().is_some_and(|cell| cell.is_published())
    }

    /// Check whether the receiver can still produce values
    pub fn is_closed(&self) -> bool {
        self.cursor.is_none() || self.shutdown.is_cancelled()
    }

    /// Consume the receiver as a stream that ends when the broadcaster closes
    pub fn into_stream(self) -> impl Stream<Item = T> + Send {
        futures::stream::unfold(self, |mut rx| async move {
            let value = rx.read().await.ok()?;
            Some((value, rx))
        })
    }
}
