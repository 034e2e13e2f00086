use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::registry::EventRegistry;
use super::Event;
use crate::pool::panic_message;

/// Runs handlers when events are emitted and their condition holds
///
/// Clones share the emitted mark and the off switch.
#[derive(Debug, Clone)]
pub struct Listener {
    registry: EventRegistry,
    emitted: Arc<AtomicBool>,
    off: Arc<Mutex<CancellationToken>>,
}

impl Listener {
    pub(crate) fn new(registry: EventRegistry) -> Self {
        Self {
            registry,
            emitted: Arc::new(AtomicBool::new(false)),
            off: Arc::new(Mutex::new(CancellationToken::new())),
        }
    }

    /// Start listening for `event`
    ///
    /// Each emission marks the listener emitted and evaluates
    /// [`Event::cond`]; when it holds, `handler` runs and the mark is cleared.
    /// Returns once the listening task is waiting, so any emission after this
    /// call is observed. A panic in `cond` or `handler` is logged, clears the
    /// mark and leaves the listener running.
    pub async fn on<E, F>(&self, event: Arc<E>, mut handler: F)
    where
        E: Event,
        F: FnMut(&E) + Send + 'static,
    {
        let notify = self.registry.entry(event.id());
        let off = self.off.lock().clone();
        let emitted = Arc::clone(&self.emitted);
        let (ready, waiting) = oneshot::channel();

        tokio::spawn(async move {
            let notified = notify.notified();
            tokio::pin!(notified);
            let _ = ready.send(());
            debug!(event_id = event.id(), "Event listener started");

            loop {
                tokio::select! {
                    biased;
                    _ = off.cancelled() => break,
                    _ = &mut notified => {}
                }
                // Re-arm before running user code so no emission is missed.
                notified.set(notify.notified());

                emitted.store(true, Ordering::SeqCst);
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    let holds = event.cond();
                    if holds {
                        handler(event.as_ref());
                    }
                    holds
                }));
                match outcome {
                    Ok(true) => emitted.store(false, Ordering::SeqCst),
                    Ok(false) => {}
                    Err(payload) => {
                        emitted.store(false, Ordering::SeqCst);
                        error!(
                            event_id = event.id(),
                            error = %panic_message(payload.as_ref()),
                            "Event handler panicked"
                        );
                    }
                }
            }

            debug!(event_id = event.id(), "Event listener stopped");
        });

        let _ = waiting.await;
    }

    /// Whether an emission was received that has not yet satisfied the
    /// event's condition
    pub fn is_emitted(&self) -> bool {
        self.emitted.load(Ordering::SeqCst)
    }

    /// Stop every listening task started by this listener
    ///
    /// The listener can be reused with [`Listener::on`] afterwards.
    pub fn off(&self) {
        let previous = std::mem::take(&mut *self.off.lock());
        previous.cancel();
    }
}
