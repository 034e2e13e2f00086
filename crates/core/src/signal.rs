//! One-shot signals and their OR / AND combinators
//!
//! A [`Signal`] fires at most once and stays fired. Combinators return a new
//! signal driven by a background task, so they must be called inside a Tokio
//! runtime.
//!
//! ```text
//!   or([a, b, c])   fires when the first of a, b, c fires
//!   and([a, b, c])  fires when the last of a, b, c fires
//! ```

use std::future::Future;
use std::time::Duration;

use futures::future::{join_all, select_all};
use tokio_util::sync::CancellationToken;

/// A one-shot completion signal
///
/// Clones share state: firing any clone fires them all.
#[derive(Debug, Clone, Default)]
pub struct Signal {
    token: CancellationToken,
}

impl Signal {
    /// Create an unfired signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal that fires once `delay` has elapsed
    pub fn after(delay: Duration) -> Self {
        Self::from_future(tokio::time::sleep(delay))
    }

    /// Signal that fires when `future` completes
    ///
    /// The future is dropped without completing if the signal is fired first.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future + Send + 'static,
    {
        let signal = Self::new();
        let output = signal.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = output.token.cancelled() => {}
                _ = future => output.fire(),
            }
        });
        signal
    }

    /// Fire the signal; firing twice is a no-op
    pub fn fire(&self) {
        self.token.cancel();
    }

    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the signal fires
    pub async fn fired(&self) {
        self.token.cancelled().await
    }

    /// Underlying cancellation token
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl From<CancellationToken> for Signal {
    fn from(token: CancellationToken) -> Self {
        Self { token }
    }
}

/// Combine signals into one that fires as soon as any input fires
///
/// Returns `None` for no inputs and the input itself for a single one.
pub fn or<I>(signals: I) -> Option<Signal>
where
    I: IntoIterator<Item = Signal>,
{
    let mut signals: Vec<Signal> = signals.into_iter().collect();
    match signals.len() {
        0 => return None,
        1 => return signals.pop(),
        _ => {}
    }

    let output = Signal::new();
    if signals.iter().any(Signal::is_fired) {
        output.fire();
        return Some(output);
    }

    let done = output.clone();
    tokio::spawn(async move {
        let first = select_all(signals.iter().map(|s| Box::pin(s.fired())));
        tokio::select! {
            _ = done.fired() => {}
            _ = first => done.fire(),
        }
    });

    Some(output)
}

/// Combine signals into one that fires once every input has fired
///
/// Returns `None` for no inputs and the input itself for a single one.
pub fn and<I>(signals: I) -> Option<Signal>
where
    I: IntoIterator<Item = Signal>,
{
    let mut signals: Vec<Signal> = signals.into_iter().collect();
    match signals.len() {
        0 => return None,
        1 => return signals.pop(),
        _ => {}
    }

    let output = Signal::new();
    if signals.iter().all(Signal::is_fired) {
        output.fire();
        return Some(output);
    }

    let done = output.clone();
    tokio::spawn(async move {
        let all = join_all(signals.iter().map(|s| s.fired()));
        tokio::select! {
            _ = done.fired() => {}
            _ = all => done.fire(),
        }
    });

    Some(output)
}
