//! Cells of the broadcast chain
//!
//! A cell starts empty and is published exactly once by the coordinating task.
//! Publishing stores the value together with the next (still empty) cell, so a
//! reader that holds a cell can always reach every later value.

use std::sync::Arc;

use tokio::sync::watch;

/// Published content of a cell
#[derive(Clone)]
pub(crate) struct Link<T> {
    pub(crate) value: T,
    pub(crate) next: Arc<Cell<T>>,
}

pub(crate) struct Cell<T> {
    slot: watch::Sender<Option<Link<T>>>,
}

impl<T> Cell<T> {
    pub(crate) fn empty() -> Arc<Self> {
        let (slot, _) = watch::channel(None);
        Arc::new(Self { slot })
    }

    /// Store `value` and link the next cell; only the coordinator calls this
    pub(crate) fn publish(&self, value: T, next: Arc<Cell<T>>) {
        self.slot.send_replace(Some(Link { value, next }));
    }

    pub(crate) fn is_published(&self) -> bool {
        self.slot.borrow().is_some()
    }
}

// Unlinks the chain one cell at a time; the default drop would recurse once
// per unread value.
impl<T> Drop for Cell<T> {
    fn drop(&mut self) {
        let mut next = match self.slot.send_replace(None) {
            Some(link) => link.next,
            None => return,
        };
        while let Some(cell) = Arc::into_inner(next) {
            next = match cell.slot.send_replace(None) {
                Some(link) => link.next,
                None => break,
            };
        }
    }
}

impl<T: Clone> Cell<T> {
    /// Wait until the cell is published and return a copy of its link
    ///
    /// The shared cell is never modified by readers.
    pub(crate) async fn wait(&self) -> Option<Link<T>> {
        let mut rx = self.slot.subscribe();
        let published = rx.wait_for(Option::is_some).await.ok()?;
        published.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_returns_published_link() {
        let cell = Cell::empty();
        let next = Cell::empty();
        assert!(!cell.is_published());

        cell.publish(7, Arc::clone(&next));

        let link = cell.wait().await.unwrap();
        assert_eq!(link.value, 7);
        assert!(Arc::ptr_eq(&link.next, &next));
        assert!(cell.is_published());
        assert!(!next.is_published());
    }

    #[tokio::test]
    async fn test_wait_blocks_until_publish() {
        let cell: Arc<Cell<&'static str>> = Cell::empty();

        let waiter = {
            let cell = Arc::clone(&cell);
            tokio::spawn(async move { cell.wait().await.map(|link| link.value) })
        };

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        cell.publish("hello", Cell::empty());
        assert_eq!(waiter.await.unwrap(), Some("hello"));
    }

    #[test]
    fn test_long_chain_drops_without_recursion() {
        let head: Arc<Cell<u64>> = Cell::empty();
        let mut tail = Arc::clone(&head);
        for i in 0..200_000 {
            let next = Cell::empty();
            tail.publish(i, Arc::clone(&next));
            tail = next;
        }

        let kept = Arc::clone(&tail);
        drop(tail);
        drop(head);
        assert!(!kept.is_published());
    }

    #[tokio::test]
    async fn test_every_reader_sees_same_value() {
        let cell = Cell::empty();
        cell.publish(String::from("shared"), Cell::empty());

        let first = cell.wait().await.unwrap();
        let second = cell.wait().await.unwrap();
        assert_eq!(first.value, "shared");
        assert_eq!(second.value, "shared");
    }
}
