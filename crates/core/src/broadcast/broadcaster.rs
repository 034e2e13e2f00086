//! Broadcaster handle and its coordinating task

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::cell::Cell;
use super::receiver::Receiver;
use super::BroadcastError;
use crate::config::{ConfigError, EnvSource};

/// Default depth of the command queue in front of the coordinating task
pub const DEFAULT_BUFFER: usize = 64;

/// Broadcaster configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcasterConfig {
    /// Pending writes/listens accepted before `write` and `listen` wait
    pub buffer: usize,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            buffer: DEFAULT_BUFFER,
        }
    }
}

impl BroadcasterConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `BROADCAST_BUFFER`: Command queue depth (default: 64)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&EnvSource::new())
    }

    /// Create configuration from an explicit source
    pub fn from_source(source: &EnvSource) -> Result<Self, ConfigError> {
        Ok(Self {
            buffer: source.parse("BROADCAST_BUFFER", DEFAULT_BUFFER)?,
        })
    }

    /// Set the command queue depth
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }
}

/// Requests served by the coordinating task, in arrival order
enum Command<T> {
    Write(T),
    Listen(oneshot::Sender<Arc<Cell<T>>>),
}

/// Multicast channel: every receiver gets every value written after it started
/// listening, exactly once and in write order
///
/// A single coordinating task owns the end of the chain; handles only send it
/// commands. Writes and listens travel through the same queue, so a receiver
/// created after `write` returned never sees that value, and one created before
/// always does.
///
/// Must be created inside a Tokio runtime.
///
/// # Example
///
/// ```
/// use switchyard_core::broadcast::{Broadcaster, Transform};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), switchyard_core::broadcast::BroadcastError> {
/// let broadcaster = Broadcaster::new();
/// let mut a = broadcaster.listen().await?;
/// let mut b = broadcaster.listen().await?;
///
/// broadcaster.write(42).await?;
///
/// assert_eq!(a.read().await?, 42);
/// let bump: &Transform<i32> = &|v| Ok(v + 1);
/// assert_eq!(b.read_with(&[bump]).await?, 43);
///
/// broadcaster.close();
/// assert!(a.read().await.is_err());
/// # Ok(())
/// # }
/// ```
pub struct Broadcaster<T> {
    commands: mpsc::Sender<Command<T>>,
    shutdown: CancellationToken,
    closed: Arc<RwLock<bool>>,
}

impl<T> Clone for Broadcaster<T> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            shutdown: self.shutdown.clone(),
            closed: Arc::clone(&self.closed),
        }
    }
}

impl<T> std::fmt::Debug for Broadcaster<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("closed", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl<T> Default for Broadcaster<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Broadcaster<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a broadcaster with default configuration
    pub fn new() -> Self {
        Self::with_config(BroadcasterConfig::default())
    }

    /// Create a broadcaster and spawn its coordinating task
    pub fn with_config(config: BroadcasterConfig) -> Self {
        let (commands, inbox) = mpsc::channel(config.buffer.max(1));
        let shutdown = CancellationToken::new();
        let closed = Arc::new(RwLock::new(false));

        tokio::spawn(coordinate(inbox, shutdown.clone(), Arc::clone(&closed)));

        Self {
            commands,
            shutdown,
            closed,
        }
    }

    /// Create a receiver positioned at the next unwritten value
    pub async fn listen(&self) -> Result<Receiver<T>, BroadcastError> {
        let closed = self.closed.read().await;
        if *closed || self.shutdown.is_cancelled() {
            return Err(BroadcastError::Closed);
        }

        let (reply, reply_rx) = oneshot::channel();
        let cursor = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => None,
            cursor = async {
                self.commands.send(Command::Listen(reply)).await.ok()?;
                reply_rx.await.ok()
            } => cursor,
        };
        drop(closed);

        cursor
            .map(|cursor| Receiver::new(cursor, self.shutdown.clone()))
            .ok_or(BroadcastError::Closed)
    }

    /// Append `value` to the stream
    pub async fn write(&self, value: T) -> Result<(), BroadcastError> {
        let closed = self.closed.read().await;
        if *closed || self.shutdown.is_cancelled() {
            return Err(BroadcastError::Closed);
        }

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(BroadcastError::Closed),
            sent = self.commands.send(Command::Write(value)) => {
                sent.map_err(|_| BroadcastError::Closed)
            }
        }
    }

    /// Fire the shutdown signal
    ///
    /// Blocked and future reads, writes and listens fail with
    /// [`BroadcastError::Closed`]. Calling it again is a no-op.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// Check whether the shutdown signal fired
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// The only writer of the chain
async fn coordinate<T>(
    mut inbox: mpsc::Receiver<Command<T>>,
    shutdown: CancellationToken,
    closed: Arc<RwLock<bool>>,
) {
    let mut current: Arc<Cell<T>> = Cell::empty();
    let mut written: u64 = 0;
    let mut listeners: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            command = inbox.recv() => match command {
                Some(Command::Write(value)) => {
                    let next = Cell::empty();
                    current.publish(value, Arc::clone(&next));
                    current = next;
                    written += 1;
                    trace!(written, "Broadcast value published");
                }
                Some(Command::Listen(reply)) => {
                    if reply.send(Arc::clone(&current)).is_ok() {
                        listeners += 1;
                    }
                }
                // Every handle was dropped
                None => break,
            },
        }
    }

    // Receivers wake on the token; handles check the flag under the lock.
    shutdown.cancel();
    *closed.write().await = true;
    inbox.close();

    debug!(written, listeners, "Broadcaster closed");
}
