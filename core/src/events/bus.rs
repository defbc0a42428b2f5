use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Identifies one subscription on an [`EventBus`]. Returned by `subscribe`
/// and consumed by `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Trait for anything that wants to observe events on a bus.
/// Implement this for loggers, settings views and test recorders.
pub trait Subscriber<E> {
    fn on_event(&self, event: &E);
}

impl<E, F> Subscriber<E> for F
where
    F: Fn(&E),
{
    fn on_event(&self, event: &E) {
        self(event)
    }
}

/// Synchronous, single-threaded publish/subscribe channel.
///
/// `publish` calls every current subscriber in subscription order before it
/// returns. There is no queue: a subscriber that publishes again from inside
/// `on_event` is dispatched immediately (nested), against the subscriber list
/// as it was when the outer publish started.
pub struct EventBus<E> {
    subscribers: RefCell<Vec<(SubscriptionId, Rc<dyn Subscriber<E>>)>>,
    next_id: Cell<u64>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self {
            subscribers: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    pub fn subscribe(&self, subscriber: Rc<dyn Subscriber<E>>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.subscribers.borrow_mut().push((id, subscriber));
        id
    }

    /// Convenience wrapper for closure subscribers
    pub fn subscribe_fn(&self, f: impl Fn(&E) + 'static) -> SubscriptionId {
        self.subscribe(Rc::new(f))
    }

    /// Remove a subscription. Returns false if the id was unknown (already
    /// removed), so double-unsubscribe is harmless.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        subscribers.len() != before
    }

    pub fn publish(&self, event: &E) {
        // Snapshot so subscribers may subscribe or publish while being called
        let snapshot: Vec<Rc<dyn Subscriber<E>>> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, sub)| Rc::clone(sub))
            .collect();

        for subscriber in snapshot {
            subscriber.on_event(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}
