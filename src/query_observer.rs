use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::query::Query;
use crate::subscribable::{Subscribable, Subscription};
use crate::{Action, QueryError, QueryObserverOptions, QueryResult, QueryValue};

/// Listener receiving derived results from a [`QueryObserver`].
pub type ResultListener<TData, TError> = Rc<dyn Fn(&QueryResult<TData, TError>)>;

/// Presents a deduplicated, flag-annotated view of one query to external
/// listeners.
///
/// An observer owns its [`Query`] for its entire lifetime and registers
/// itself as a low-level observer of it. On every dispatched transition it
/// derives a [`QueryResult`] and notifies its subscribed listeners, unless
/// the result is field-identical to the previously delivered one.
pub struct QueryObserver<TData, TError> {
    id: ObserverKey,
    query: Query<TData, TError>,
    current_result: Rc<Cell<QueryResult<TData, TError>>>,
    listeners: Subscribable<dyn Fn(&QueryResult<TData, TError>)>,
}

impl<TData, TError> Clone for QueryObserver<TData, TError> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            query: self.query.clone(),
            current_result: Rc::clone(&self.current_result),
            listeners: self.listeners.clone(),
        }
    }
}

impl<TData, TError> std::fmt::Debug for QueryObserver<TData, TError> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryObserver")
            .field("id", &self.id)
            .field("query", &"...")
            .field("listeners", &"...")
            .finish()
    }
}

impl<TData, TError> QueryObserver<TData, TError>
where
    TData: QueryValue,
    TError: QueryError,
{
    /// Creates an observer over a fresh query for the given producer.
    ///
    /// Listeners carried in `options` are subscribed immediately and stay
    /// subscribed for the observer's lifetime. When `fetch_on_mount` is set,
    /// an initial fetch is triggered before this returns.
    pub fn new<F, Fu>(producer: F, options: QueryObserverOptions<TData, TError>) -> Self
    where
        F: Fn() -> Fu + 'static,
        Fu: Future<Output = Result<TData, TError>> + 'static,
    {
        let query = Query::with_options(producer, options.retry);

        let observer = Self {
            id: next_id(),
            query,
            current_result: Rc::new(Cell::new(QueryResult::default())),
            listeners: Subscribable::new(),
        };

        // Observe our own query to get low-level updates of it.
        observer.query.add_observer(&observer);

        for listener in options.listeners {
            observer.listeners.subscribe(listener);
        }

        if options.fetch_on_mount {
            observer.query.fetch();
        }

        observer
    }

    pub(crate) fn id(&self) -> ObserverKey {
        self.id
    }

    pub(crate) fn on_query_update(&self, action: &Action<TData, TError>) {
        let result = self
            .query
            .with_state(|state| QueryResult::from_transition(state, action));

        let previous = self.current_result();
        if result == previous {
            return;
        }

        self.current_result.set(result.clone());

        for listener in self.listeners.listeners() {
            listener(&result);
        }
    }

    /// Triggers a fetch cycle on the underlying query.
    pub fn fetch(&self) {
        self.query.fetch();
    }

    /// Alias for [`fetch`](QueryObserver::fetch).
    pub fn refetch(&self) {
        self.fetch();
    }

    /// Registers a listener for derived results.
    pub fn subscribe(
        &self,
        listener: impl Fn(&QueryResult<TData, TError>) + 'static,
    ) -> Subscription {
        self.listeners.subscribe(Rc::new(listener))
    }

    /// Returns whether any listener is currently subscribed.
    pub fn has_listeners(&self) -> bool {
        self.listeners.has_listeners()
    }

    /// The most recently derived result.
    pub fn current_result(&self) -> QueryResult<TData, TError> {
        let result = self.current_result.take();
        let result_clone = result.clone();
        self.current_result.set(result);
        result_clone
    }

    /// Deregisters this observer from its query.
    ///
    /// After cleanup the query no longer delivers updates here.
    pub fn cleanup(&self) {
        if !self.query.remove_observer(self) {
            tracing::debug!("cleanup: observer was not registered");
        }
        if self.listeners.has_listeners() {
            tracing::warn!("cleanup: observer still has subscribed listeners");
        }
    }
}

static NEXT_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ObserverKey(u32);

fn next_id() -> ObserverKey {
    ObserverKey(NEXT_ID.fetch_add(1, Ordering::Relaxed))
}
