use std::rc::Rc;
use std::time::Duration;

use crate::query_observer::ResultListener;
use crate::QueryResult;

const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);
const DEFAULT_RETRY_TIMES: u32 = 3;

/// Retry policy for a query's producer execution.
///
/// Applied by the [`Retrier`](crate::Retrier) to every fetch cycle of the
/// query it was configured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOptions {
    /// Force indefinite retry, ignoring `retry_times`.
    /// Default is `false`.
    pub retry: bool,
    /// The delay between a failed attempt and its retry.
    /// Default is 1000 milliseconds.
    pub retry_delay: Duration,
    /// The number of retries after the initial attempt. A producer that
    /// always fails is invoked `retry_times + 1` times in total.
    /// Default is 3.
    pub retry_times: u32,
}

impl RetryOptions {
    /// Set whether to retry indefinitely.
    pub fn set_retry(self, retry: bool) -> Self {
        RetryOptions { retry, ..self }
    }

    /// Set the delay between attempts.
    pub fn set_retry_delay(self, retry_delay: Duration) -> Self {
        RetryOptions {
            retry_delay,
            ..self
        }
    }

    /// Set the retry budget.
    pub fn set_retry_times(self, retry_times: u32) -> Self {
        RetryOptions {
            retry_times,
            ..self
        }
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            retry: false,
            retry_delay: DEFAULT_RETRY_DELAY,
            retry_times: DEFAULT_RETRY_TIMES,
        }
    }
}

/// Options for a [`QueryObserver`](crate::QueryObserver).
pub struct QueryObserverOptions<TData, TError> {
    /// Trigger an initial fetch as soon as the observer is constructed.
    /// Default is `false`.
    pub fetch_on_mount: bool,
    /// Retry policy forwarded to the observer's query.
    pub retry: RetryOptions,
    /// Listeners subscribed immediately upon construction.
    /// Default is empty.
    pub listeners: Vec<ResultListener<TData, TError>>,
}

impl<TData, TError> QueryObserverOptions<TData, TError> {
    /// Set whether to fetch on mount.
    pub fn set_fetch_on_mount(self, fetch_on_mount: bool) -> Self {
        QueryObserverOptions {
            fetch_on_mount,
            ..self
        }
    }

    /// Set the retry policy.
    pub fn set_retry(self, retry: RetryOptions) -> Self {
        QueryObserverOptions { retry, ..self }
    }

    /// Add a listener to be subscribed on construction.
    pub fn add_listener(
        mut self,
        listener: impl Fn(&QueryResult<TData, TError>) + 'static,
    ) -> Self {
        self.listeners.push(Rc::new(listener));
        self
    }
}

impl<TData, TError> Default for QueryObserverOptions<TData, TError> {
    fn default() -> Self {
        Self {
            fetch_on_mount: false,
            retry: RetryOptions::default(),
            listeners: Vec::new(),
        }
    }
}

impl<TData, TError> std::fmt::Debug for QueryObserverOptions<TData, TError> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryObserverOptions")
            .field("fetch_on_mount", &self.fetch_on_mount)
            .field("retry", &self.retry)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
