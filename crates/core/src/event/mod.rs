//! Conditional event notifications
//!
//! An [`Emitter`] wakes every [`Listener`] waiting on an event id; the
//! listener runs its handler only when the event's condition holds. Both are
//! created from an [`EventRegistry`], which owns the id table.
//!
//! ```text
//!   Emitter::emit(evt) ──► registry[evt.id()] ──► Listener task
//!                                                  mark emitted
//!                                                  evt.cond()? ──► handler(evt)
//! ```

mod listener;
mod registry;

pub use listener::Listener;
pub use registry::{Emitter, EventRegistry};

/// An event that listeners can wait for
pub trait Event: Send + Sync + 'static {
    /// Key shared by the emitter and the listeners of this event
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    /// Evaluated by a listener after each emission
    fn cond(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;

    /// Holds after `limit` emissions
    struct Threshold {
        limit: usize,
        counter: AtomicUsize,
        listener: Listener,
        evaluated: mpsc::UnboundedSender<bool>,
    }

    impl Event for Threshold {
        fn id(&self) -> &str {
            "threshold"
        }

        fn name(&self) -> &str {
            "threshold event"
        }

        fn cond(&self) -> bool {
            let hit = self.listener.is_emitted()
                && self.counter.fetch_add(1, Ordering::SeqCst) + 1 >= self.limit;
            let _ = self.evaluated.send(hit);
            hit
        }
    }

    struct Ping;

    impl Event for Ping {
        fn id(&self) -> &str {
            "ping"
        }

        fn name(&self) -> &str {
            "ping"
        }
    }

    #[tokio::test]
    async fn test_handler_runs_when_condition_holds() {
        let registry = EventRegistry::new();
        let listener = registry.listener();
        let (evaluated, mut evaluations) = mpsc::unbounded_channel();
        let event = Arc::new(Threshold {
            limit: 2,
            counter: AtomicUsize::new(0),
            listener: listener.clone(),
            evaluated,
        });

        let (called, mut calls) = mpsc::unbounded_channel();
        listener
            .on(Arc::clone(&event), move |e: &Threshold| {
                let _ = called.send(e.counter.load(Ordering::SeqCst));
            })
            .await;
        assert!(!listener.is_emitted());

        let emitter = registry.emitter();
        emitter.emit(event.as_ref());
        assert_eq!(evaluations.recv().await, Some(false));
        assert!(listener.is_emitted());
        assert!(calls.try_recv().is_err());

        emitter.emit(event.as_ref());
        assert_eq!(evaluations.recv().await, Some(true));
        assert_eq!(calls.recv().await, Some(2));
        assert!(!listener.is_emitted());
    }

    #[tokio::test]
    async fn test_every_listener_is_woken() {
        let registry = EventRegistry::new();
        let (called, mut calls) = mpsc::unbounded_channel();

        for i in 0..3 {
            let called = called.clone();
            registry
                .listener()
                .on(Arc::new(Ping), move |_: &Ping| {
                    let _ = called.send(i);
                })
                .await;
        }

        registry.emitter().emit(&Ping);

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(calls.recv().await.unwrap());
        }
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_off_stops_listening() {
        let registry = EventRegistry::new();
        let listener = registry.listener();
        let (called, mut calls) = mpsc::unbounded_channel();

        listener
            .on(Arc::new(Ping), move |_: &Ping| {
                let _ = called.send(());
            })
            .await;

        listener.off();
        listener.off();
        tokio::time::sleep(Duration::from_millis(10)).await;

        registry.emitter().emit(&Ping);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(calls.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_handler_panic_keeps_listening() {
        let registry = EventRegistry::new();
        let listener = registry.listener();
        let (called, mut calls) = mpsc::unbounded_channel();

        let mut count = 0;
        listener
            .on(Arc::new(Ping), move |_: &Ping| {
                count += 1;
                let _ = called.send(count);
                if count == 1 {
                    panic!("handler failed");
                }
            })
            .await;

        let emitter = registry.emitter();
        emitter.emit(&Ping);
        assert_eq!(calls.recv().await, Some(1));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!listener.is_emitted());

        emitter.emit(&Ping);
        assert_eq!(calls.recv().await, Some(2));
    }

    #[tokio::test]
    async fn test_listener_reusable_after_off() {
        let registry = EventRegistry::new();
        let listener = registry.listener();
        listener.off();

        let (called, mut calls) = mpsc::unbounded_channel();
        listener
            .on(Arc::new(Ping), move |_: &Ping| {
                let _ = called.send(());
            })
            .await;

        registry.emitter().emit(&Ping);
        assert_eq!(calls.recv().await, Some(()));
    }

    #[test]
    fn test_registry_lifecycle() {
        let registry = EventRegistry::new();
        assert!(registry.is_empty());

        let first = registry.entry("a");
        let again = registry.entry("a");
        assert!(Arc::ptr_eq(&first, &again));
        registry.entry("b");
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("a"));

        assert!(registry.remove("a"));
        assert!(!registry.remove("a"));
        assert!(!registry.contains("a"));

        let fresh = registry.entry("a");
        assert!(!Arc::ptr_eq(&first, &fresh));
    }

    #[test]
    fn test_registries_are_independent() {
        let one = EventRegistry::new();
        let two = EventRegistry::new();
        one.entry("shared");
        assert!(two.is_empty());

        let clone = one.clone();
        assert!(clone.contains("shared"));
    }
}
