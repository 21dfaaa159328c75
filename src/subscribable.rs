use std::cell::RefCell;
use std::rc::Rc;

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    struct ListenerKey;
}

type ActivityHook = Rc<dyn Fn()>;

/// A registry of listener callbacks with activity transition hooks.
///
/// Listeners are stored by insertion order and are not deduplicated: every
/// [`subscribe`](Subscribable::subscribe) call adds a new entry, even for a
/// listener value that is already registered. The optional hooks fire on
/// every subscribe and every unsubscribe respectively.
pub struct Subscribable<TListener: ?Sized> {
    listeners: Rc<RefCell<SlotMap<ListenerKey, Rc<TListener>>>>,
    on_subscribe: Option<ActivityHook>,
    on_unsubscribe: Option<ActivityHook>,
}

impl<TListener: ?Sized> Clone for Subscribable<TListener> {
    fn clone(&self) -> Self {
        Self {
            listeners: Rc::clone(&self.listeners),
            on_subscribe: self.on_subscribe.clone(),
            on_unsubscribe: self.on_unsubscribe.clone(),
        }
    }
}

impl<TListener: ?Sized + 'static> Default for Subscribable<TListener> {
    fn default() -> Self {
        Self::new()
    }
}

impl<TListener: ?Sized + 'static> Subscribable<TListener> {
    /// Creates an empty registry without activity hooks.
    pub fn new() -> Self {
        Self {
            listeners: Rc::new(RefCell::new(SlotMap::with_key())),
            on_subscribe: None,
            on_unsubscribe: None,
        }
    }

    /// Creates an empty registry with the given activity hooks.
    pub fn with_hooks(
        on_subscribe: impl Fn() + 'static,
        on_unsubscribe: impl Fn() + 'static,
    ) -> Self {
        Self {
            listeners: Rc::new(RefCell::new(SlotMap::with_key())),
            on_subscribe: Some(Rc::new(on_subscribe)),
            on_unsubscribe: Some(Rc::new(on_unsubscribe)),
        }
    }

    /// Registers a listener and returns the capability to deregister it.
    ///
    /// Dropping the returned [`Subscription`] without calling
    /// [`unsubscribe`](Subscription::unsubscribe) leaves the listener
    /// registered for the registry's lifetime.
    pub fn subscribe(&self, listener: Rc<TListener>) -> Subscription {
        let key = self
            .listeners
            .try_borrow_mut()
            .expect("subscribe borrow_mut")
            .insert(listener);

        if let Some(hook) = &self.on_subscribe {
            hook();
        }

        let listeners = Rc::clone(&self.listeners);
        let on_unsubscribe = self.on_unsubscribe.clone();

        Subscription {
            cancel: Box::new(move || {
                listeners
                    .try_borrow_mut()
                    .expect("unsubscribe borrow_mut")
                    .remove(key);

                if let Some(hook) = on_unsubscribe {
                    hook();
                }
            }),
        }
    }

    /// Returns whether any listener is currently registered.
    pub fn has_listeners(&self) -> bool {
        !self
            .listeners
            .try_borrow()
            .expect("has_listeners borrow")
            .is_empty()
    }

    /// Returns a snapshot of the registered listeners, in insertion order.
    ///
    /// Notification passes iterate over this snapshot, so subscribing or
    /// unsubscribing from inside a listener does not affect the pass in
    /// progress. A listener removed mid-pass still receives the in-flight
    /// notification.
    pub fn listeners(&self) -> Vec<Rc<TListener>> {
        self.listeners
            .try_borrow()
            .expect("listeners borrow")
            .values()
            .cloned()
            .collect()
    }
}

/// Capability to remove one registered listener.
pub struct Subscription {
    cancel: Box<dyn FnOnce()>,
}

impl Subscription {
    /// Removes exactly the listener this subscription was returned for.
    pub fn unsubscribe(self) {
        (self.cancel)();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn subscribe_and_unsubscribe() {
        let registry: Subscribable<dyn Fn()> = Subscribable::new();
        assert!(!registry.has_listeners());

        let subscription = registry.subscribe(Rc::new(|| {}));
        assert!(registry.has_listeners());

        subscription.unsubscribe();
        assert!(!registry.has_listeners());
    }

    #[test]
    fn no_deduplication_of_identical_listeners() {
        let registry: Subscribable<dyn Fn()> = Subscribable::new();
        let listener: Rc<dyn Fn()> = Rc::new(|| {});

        let first = registry.subscribe(listener.clone());
        let _second = registry.subscribe(listener);

        assert_eq!(registry.listeners().len(), 2);

        // Removing one entry leaves the other registered.
        first.unsubscribe();
        assert_eq!(registry.listeners().len(), 1);
        assert!(registry.has_listeners());
    }

    #[test]
    fn hooks_fire_on_every_transition() {
        let subscribes = Rc::new(Cell::new(0));
        let unsubscribes = Rc::new(Cell::new(0));

        let registry: Subscribable<dyn Fn()> = Subscribable::with_hooks(
            {
                let subscribes = subscribes.clone();
                move || subscribes.set(subscribes.get() + 1)
            },
            {
                let unsubscribes = unsubscribes.clone();
                move || unsubscribes.set(unsubscribes.get() + 1)
            },
        );

        let first = registry.subscribe(Rc::new(|| {}));
        let second = registry.subscribe(Rc::new(|| {}));
        assert_eq!(subscribes.get(), 2, "subscribe hook fires on each call");
        assert_eq!(unsubscribes.get(), 0);

        first.unsubscribe();
        second.unsubscribe();
        assert_eq!(unsubscribes.get(), 2, "unsubscribe hook fires on each call");
    }

    #[test]
    fn snapshot_is_unaffected_by_removal() {
        let registry: Subscribable<dyn Fn()> = Subscribable::new();
        let subscription = registry.subscribe(Rc::new(|| {}));
        let _other = registry.subscribe(Rc::new(|| {}));

        let snapshot = registry.listeners();
        subscription.unsubscribe();

        assert_eq!(snapshot.len(), 2, "snapshot keeps the removed listener");
        assert_eq!(registry.listeners().len(), 1);
    }
}
