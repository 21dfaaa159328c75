use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::FutureExt;

use crate::query_observer::{ObserverKey, QueryObserver};
use crate::{
    Action, QueryError, QueryState, QueryStatus, QueryValue, Retrier, RetrierConfig, RetryOptions,
};

pub(crate) type QueryFn<TData, TError> =
    Rc<dyn Fn() -> LocalBoxFuture<'static, Result<TData, TError>>>;

/// The owning state machine for one logical asynchronous fetch operation.
///
/// A query holds the canonical [`QueryState`], runs at most one
/// [`Retrier`] at a time, and fans every dispatched [`Action`] out to its
/// registered observers. Cloning a query yields another handle to the same
/// underlying state.
pub struct Query<TData, TError> {
    producer: QueryFn<TData, TError>,
    options: RetryOptions,

    // State
    state: Rc<Cell<QueryState<TData, TError>>>,

    // Synchronization
    observers: Rc<RefCell<HashMap<ObserverKey, QueryObserver<TData, TError>>>>,
    retrier: Rc<Cell<Option<Retrier<TData, TError>>>>,
}

impl<TData, TError> Clone for Query<TData, TError> {
    fn clone(&self) -> Self {
        Self {
            producer: Rc::clone(&self.producer),
            options: self.options,
            state: Rc::clone(&self.state),
            observers: Rc::clone(&self.observers),
            retrier: Rc::clone(&self.retrier),
        }
    }
}

impl<TData, TError> std::fmt::Debug for Query<TData, TError>
where
    TData: QueryValue,
    TError: QueryError,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("state", &self.state())
            .finish()
    }
}

impl<TData, TError> Query<TData, TError>
where
    TData: QueryValue,
    TError: QueryError,
{
    /// Creates an idle query over the given producer with the default retry
    /// policy.
    pub fn new<F, Fu>(producer: F) -> Self
    where
        F: Fn() -> Fu + 'static,
        Fu: Future<Output = Result<TData, TError>> + 'static,
    {
        Self::with_options(producer, RetryOptions::default())
    }

    /// Creates an idle query with an explicit retry policy.
    pub fn with_options<F, Fu>(producer: F, options: RetryOptions) -> Self
    where
        F: Fn() -> Fu + 'static,
        Fu: Future<Output = Result<TData, TError>> + 'static,
    {
        Query {
            producer: Rc::new(move || producer().boxed_local()),
            options,
            state: Rc::new(Cell::new(QueryState::default())),
            observers: Rc::new(RefCell::new(HashMap::new())),
            retrier: Rc::new(Cell::new(None)),
        }
    }

    /// Begins a fetch cycle.
    ///
    /// A no-op while a cycle is already in flight, so at most one retrier is
    /// ever live per query.
    pub fn fetch(&self) {
        if self.with_state(|state| state.status == QueryStatus::Loading) {
            return;
        }

        self.dispatch(Action::Fetch);

        let on_success = {
            let query = self.clone();
            move |data| query.dispatch(Action::Success(data))
        };
        let on_error = {
            let query = self.clone();
            move |error| query.dispatch(Action::Error(error))
        };

        let producer = Rc::clone(&self.producer);
        let retrier = Retrier::spawn(
            move || producer(),
            RetrierConfig::default()
                .set_on_success(on_success)
                .set_on_error(on_error)
                .set_retry(self.options),
        );
        self.retrier.set(Some(retrier));
    }

    /// The pure transition function over query state.
    ///
    /// `Fetch` moves to `Loading` and touches nothing else. `Success`
    /// overwrites `data`; `Error` overwrites `error`. Neither terminal
    /// transition clears the other field, so a stale error survives a later
    /// success and stale data survives a later error.
    pub fn reduce(
        state: QueryState<TData, TError>,
        action: &Action<TData, TError>,
    ) -> QueryState<TData, TError> {
        match action {
            Action::Fetch => QueryState {
                status: QueryStatus::Loading,
                ..state
            },
            Action::Success(data) => QueryState {
                status: QueryStatus::Success,
                data: Some(data.clone()),
                ..state
            },
            Action::Error(error) => QueryState {
                status: QueryStatus::Error,
                error: Some(error.clone()),
                ..state
            },
        }
    }

    pub(crate) fn dispatch(&self, action: Action<TData, TError>) {
        let state = self.state.take();
        self.state.set(Self::reduce(state, &action));

        // Notify a snapshot so observers may register or deregister from
        // inside the pass.
        let observers: Vec<_> = self
            .observers
            .try_borrow()
            .expect("dispatch borrow")
            .values()
            .cloned()
            .collect();
        for observer in observers {
            observer.on_query_update(&action);
        }
    }

    /// Registers an observer to be notified of every dispatched action.
    ///
    /// Idempotent for the same observer instance.
    pub fn add_observer(&self, observer: &QueryObserver<TData, TError>) {
        self.observers
            .try_borrow_mut()
            .expect("add_observer borrow_mut")
            .insert(observer.id(), observer.clone());
    }

    /// Deregisters an observer. Returns whether it was registered.
    pub fn remove_observer(&self, observer: &QueryObserver<TData, TError>) -> bool {
        self.observers
            .try_borrow_mut()
            .expect("remove_observer borrow_mut")
            .remove(&observer.id())
            .is_some()
    }

    /// The executor handle for the current or most recent fetch cycle.
    ///
    /// `None` until the first fetch. Useful to await the cycle's
    /// settlement; cancelling it aborts the cycle without a terminal
    /// dispatch, so the query stays loading.
    pub fn retrier(&self) -> Option<Retrier<TData, TError>> {
        let retrier = self.retrier.take();
        let retrier_clone = retrier.clone();
        self.retrier.set(retrier);
        retrier_clone
    }

    /// Returns a clone of the current state.
    pub fn state(&self) -> QueryState<TData, TError> {
        let state = self.state.take();
        let state_clone = state.clone();
        self.state.set(state);
        state_clone
    }

    /// Reads the current state in place. Useful to avoid cloning.
    pub fn with_state<T>(&self, func: impl FnOnce(&QueryState<TData, TError>) -> T) -> T {
        let state = self.state.take();
        let result = func(&state);
        self.state.set(state);
        result
    }
}
