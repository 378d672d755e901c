//! Event system for observability (retry attempts, circuit transitions, migration steps,
//! replica health flips, ...).
//!
//! Every `dbr-*` crate that has something worth observing defines its own event enum and
//! implements [`ResilienceEvent`] for it, then hands callers an [`EventListeners`] collection
//! to register [`EventListener`]s (or plain closures, via [`FnListener`]) against.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Trait for events emitted by a `dbr` subsystem.
pub trait ResilienceEvent: Send + Sync + fmt::Debug {
    /// The event's type discriminant, e.g. `"state_transition"`, `"call_rejected"`.
    fn event_type(&self) -> &'static str;

    /// When the event occurred.
    fn timestamp(&self) -> Instant;
}

/// Trait for listening to events of a particular type.
pub trait EventListener<E: ResilienceEvent>: Send + Sync {
    fn on_event(&self, event: &E);
}

/// Adapts a plain closure into an [`EventListener`].
pub struct FnListener<F> {
    f: F,
}

impl<F> FnListener<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<E, F> EventListener<E> for FnListener<F>
where
    E: ResilienceEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}

type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// A collection of event listeners for one event type.
#[derive(Clone)]
pub struct EventListeners<E: ResilienceEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: ResilienceEvent> EventListeners<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Emits an event to every registered listener.
    ///
    /// A panicking listener is caught and does not prevent the remaining listeners from
    /// running, and does not propagate into the subsystem that triggered the event (a retry
    /// attempt or circuit transition must not be corrupted by a misbehaving observer).
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));

            if result.is_err() {
                #[cfg(feature = "tracing")]
                tracing::warn!(event_type = event.event_type(), "event listener panicked");
                #[cfg(feature = "metrics")]
                metrics::counter!("dbr_event_listener_panics_total").increment(1);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: ResilienceEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct TestEvent(Instant);

    impl ResilienceEvent for TestEvent {
        fn event_type(&self) -> &'static str {
            "test"
        }
        fn timestamp(&self) -> Instant {
            self.0
        }
    }

    #[test]
    fn emits_to_all_listeners() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut listeners = EventListeners::new();
        for _ in 0..3 {
            let count = Arc::clone(&count);
            listeners.add(FnListener::new(move |_: &TestEvent| {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }

        listeners.emit(&TestEvent(Instant::now()));
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(listeners.len(), 3);
    }

    #[test]
    fn panicking_listener_does_not_stop_others() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut listeners = EventListeners::new();

        listeners.add(FnListener::new(|_: &TestEvent| {
            panic!("boom");
        }));
        let count_clone = Arc::clone(&count);
        listeners.add(FnListener::new(move |_: &TestEvent| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        listeners.emit(&TestEvent(Instant::now()));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_by_default() {
        let listeners: EventListeners<TestEvent> = EventListeners::default();
        assert!(listeners.is_empty());
    }
}
