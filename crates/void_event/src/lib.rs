//! # void_event - Typed Action Queues
//!
//! Multi-consumer, append-only action delivery:
//! - Producers publish typed actions onto an [`ActionBus`]
//! - Every subscriber owns an [`ActionQueue`] with its own filter
//! - Draining a queue returns everything published since its last drain,
//!   in publication order, without affecting any other subscriber
//!
//! There are no callbacks. Consumers pull on their own schedule, so the
//! order in which producer and consumers run never changes what is seen.
//!
//! ```
//! use void_event::ActionBus;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum Door { Opened(u32), Closed(u32) }
//!
//! let bus = ActionBus::new();
//! let opened = bus.subscribe(|a: &Door| matches!(a, Door::Opened(_)));
//! let all = bus.subscribe_all();
//!
//! bus.publish(Door::Opened(1));
//! bus.publish(Door::Closed(1));
//!
//! assert_eq!(opened.drain(), vec![Door::Opened(1)]);
//! assert_eq!(all.drain().len(), 2);
//! assert!(opened.drain().is_empty());
//! ```

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

/// Trait for actions carried by a bus
pub trait Action: Clone + Send + Sync + 'static {}

// Blanket implementation
impl<T: Clone + Send + Sync + 'static> Action for T {}

/// Subscriber ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

type Filter<A> = Box<dyn Fn(&A) -> bool + Send + Sync>;

struct Subscription<A: Action> {
    filter: Filter<A>,
    pending: Mutex<VecDeque<A>>,
}

struct Subscriber<A: Action> {
    id: SubscriberId,
    subscription: Weak<Subscription<A>>,
}

struct BusState<A: Action> {
    subscribers: Vec<Subscriber<A>>,
    next_subscriber_id: u64,
    published: u64,
}

/// Publisher side of a typed action stream.
///
/// Cloning yields another handle onto the same bus.
pub struct ActionBus<A: Action> {
    state: Arc<Mutex<BusState<A>>>,
}

impl<A: Action> Clone for ActionBus<A> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<A: Action> ActionBus<A> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                subscribers: Vec::new(),
                next_subscriber_id: 1,
                published: 0,
            })),
        }
    }

    /// Create a queue receiving every action matching `filter`.
    ///
    /// Only actions published after this call are delivered.
    pub fn subscribe<F>(&self, filter: F) -> ActionQueue<A>
    where
        F: Fn(&A) -> bool + Send + Sync + 'static,
    {
        let subscription = Arc::new(Subscription {
            filter: Box::new(filter),
            pending: Mutex::new(VecDeque::new()),
        });

        let mut state = self.state.lock();
        let id = SubscriberId(state.next_subscriber_id);
        state.next_subscriber_id += 1;
        state.subscribers.push(Subscriber {
            id,
            subscription: Arc::downgrade(&subscription),
        });

        ActionQueue { id, subscription }
    }

    /// Create a queue receiving every action
    pub fn subscribe_all(&self) -> ActionQueue<A> {
        self.subscribe(|_| true)
    }

    /// Append an action to every matching subscriber's queue.
    ///
    /// Dropped queues are pruned here. Filters run after the bus lock is
    /// released, so a filter may use the bus itself.
    pub fn publish(&self, action: A) {
        let live: Vec<Arc<Subscription<A>>> = {
            let mut state = self.state.lock();
            state.published += 1;
            let mut live = Vec::with_capacity(state.subscribers.len());
            state.subscribers.retain(|subscriber| match subscriber.subscription.upgrade() {
                Some(subscription) => {
                    live.push(subscription);
                    true
                }
                None => false,
            });
            live
        };

        for subscription in live {
            if (subscription.filter)(&action) {
                subscription.pending.lock().push_back(action.clone());
            }
        }
    }

    /// Publish several actions, preserving their order
    pub fn publish_all<I: IntoIterator<Item = A>>(&self, actions: I) {
        for action in actions {
            self.publish(action);
        }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock();
        state
            .subscribers
            .retain(|subscriber| subscriber.subscription.strong_count() > 0);
        state.subscribers.len()
    }

    /// Total number of actions published on this bus
    pub fn published_count(&self) -> u64 {
        self.state.lock().published
    }

    /// Discard everything pending for subscriber `id`
    pub fn clear_subscriber(&self, id: SubscriberId) {
        let state = self.state.lock();
        if let Some(subscription) = state
            .subscribers
            .iter()
            .find(|s| s.id == id)
            .and_then(|s| s.subscription.upgrade())
        {
            subscription.pending.lock().clear();
        }
    }
}

impl<A: Action> Default for ActionBus<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer side: one subscriber's pending actions.
///
/// Dropping the queue unsubscribes it.
pub struct ActionQueue<A: Action> {
    id: SubscriberId,
    subscription: Arc<Subscription<A>>,
}

impl<A: Action> ActionQueue<A> {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Take all pending actions in publication order
    pub fn drain(&self) -> Vec<A> {
        self.subscription.pending.lock().drain(..).collect()
    }

    /// Take the oldest pending action
    pub fn pop(&self) -> Option<A> {
        self.subscription.pending.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.subscription.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscription.pending.lock().is_empty()
    }
}

/// Prelude
pub mod prelude {
    pub use crate::{Action, ActionBus, ActionQueue, SubscriberId};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct TestEvent(i32);

    #[test]
    fn test_drain_in_publication_order() {
        let bus = ActionBus::new();
        let queue = bus.subscribe_all();

        bus.publish_all([TestEvent(1), TestEvent(2), TestEvent(3)]);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.drain(), vec![TestEvent(1), TestEvent(2), TestEvent(3)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_subscribers_drain_independently() {
        let bus = ActionBus::new();
        let first = bus.subscribe_all();
        let second = bus.subscribe_all();

        bus.publish(TestEvent(7));
        assert_eq!(first.drain(), vec![TestEvent(7)]);

        bus.publish(TestEvent(8));
        assert_eq!(second.drain(), vec![TestEvent(7), TestEvent(8)]);
        assert_eq!(first.pop(), Some(TestEvent(8)));
        assert_eq!(first.pop(), None);
    }

    #[test]
    fn test_filtered_subscription() {
        let bus = ActionBus::new();
        let even = bus.subscribe(|e: &TestEvent| e.0 % 2 == 0);

        bus.publish_all((0..5).map(TestEvent));

        assert_eq!(even.drain(), vec![TestEvent(0), TestEvent(2), TestEvent(4)]);
    }

    #[test]
    fn test_late_subscriber_sees_only_new_actions() {
        let bus = ActionBus::new();
        bus.publish(TestEvent(1));

        let late = bus.subscribe_all();
        bus.publish(TestEvent(2));

        assert_eq!(late.drain(), vec![TestEvent(2)]);
        assert_eq!(bus.published_count(), 2);
    }

    #[test]
    fn test_dropped_queue_is_pruned() {
        let bus: ActionBus<TestEvent> = ActionBus::new();
        let kept = bus.subscribe_all();
        let dropped = bus.subscribe_all();
        assert_eq!(bus.subscriber_count(), 2);

        drop(dropped);
        bus.publish(TestEvent(1));

        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(kept.drain(), vec![TestEvent(1)]);
    }

    #[test]
    fn test_clear_subscriber() {
        let bus = ActionBus::new();
        let queue = bus.subscribe_all();
        let other = bus.subscribe_all();
        bus.publish(TestEvent(1));

        bus.clear_subscriber(queue.id());

        assert!(queue.is_empty());
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn test_filter_may_use_the_bus() {
        let bus = ActionBus::new();
        let inner = bus.clone();
        let queue = bus.subscribe(move |e: &TestEvent| inner.published_count() > 0 && e.0 > 0);

        bus.publish(TestEvent(1));
        bus.publish(TestEvent(-1));
        assert_eq!(queue.drain(), vec![TestEvent(1)]);
    }

    #[test]
    fn test_bus_is_shared_between_clones() {
        let bus = ActionBus::new();
        let producer = bus.clone();
        let queue = bus.subscribe_all();

        producer.publish(TestEvent(5));
        assert_eq!(queue.drain(), vec![TestEvent(5)]);
    }
}
