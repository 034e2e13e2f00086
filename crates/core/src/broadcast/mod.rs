//! In-process multicast channel
//!
//! Values written to a [`Broadcaster`] are delivered to every [`Receiver`]
//! that was listening at the time of the write.
//!
//! ```text
//!   write(v1)  write(v2)  write(v3)
//!       │          │          │
//!       ▼          ▼          ▼
//!   [cell v1] → [cell v2] → [cell v3] → [empty] ◄── coordinator
//!       ▲                       ▲
//!   receiver A              receiver B
//! ```
//!
//! Receivers walk the chain at their own pace. A cell is freed once no
//! receiver points at it, so a slow receiver retains the values it has not
//! read yet and nothing else.

mod broadcaster;
mod cell;
mod receiver;

pub use broadcaster::{Broadcaster, BroadcasterConfig, DEFAULT_BUFFER};
pub use receiver::{Receiver, Transform};

/// Errors returned by broadcaster and receiver operations
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error("broadcaster is closed")]
    Closed,

    #[error(transparent)]
    Handler(anyhow::Error),
}

impl BroadcastError {
    /// Check whether this error comes from a closed broadcaster
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
