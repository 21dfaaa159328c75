use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;

use futures::future::{select, Either, FutureExt, LocalBoxFuture, Shared};
use futures_channel::oneshot;
use thiserror::Error;

use crate::{QueryError, QueryValue, RetryOptions};

/// The settlement latch of a [`Retrier`].
///
/// Only the first transition out of `Pending` has effect; any settlement
/// attempted afterwards is a no-op. Cancellation leaves the latch `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Settlement {
    /// No terminal outcome yet.
    #[default]
    Pending,
    /// The producer succeeded; `on_success` has fired.
    Succeeded,
    /// The retry budget was exhausted; `on_error` has fired.
    Failed,
}

impl Settlement {
    /// Returns whether no terminal outcome has been reached.
    pub fn is_pending(self) -> bool {
        matches!(self, Settlement::Pending)
    }
}

/// Terminal failure of a fetch cycle, as observed through
/// [`Retrier::settled`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError<TError: std::fmt::Debug> {
    /// The producer failed on every attempt within the retry budget.
    #[error("producer failed after exhausting the retry budget")]
    Exhausted(TError),
    /// The executor was cancelled before settling.
    #[error("fetch was cancelled before settling")]
    Cancelled,
}

/// Configuration for a [`Retrier`].
pub struct RetrierConfig<TData, TError> {
    /// Invoked exactly once if the producer settles successfully.
    pub on_success: Option<Rc<dyn Fn(TData)>>,
    /// Invoked exactly once if the retry budget is exhausted.
    pub on_error: Option<Rc<dyn Fn(TError)>>,
    /// Retry policy for this execution.
    pub retry: RetryOptions,
}

impl<TData, TError> RetrierConfig<TData, TError> {
    /// Set the success callback.
    pub fn set_on_success(self, on_success: impl Fn(TData) + 'static) -> Self {
        RetrierConfig {
            on_success: Some(Rc::new(on_success)),
            ..self
        }
    }

    /// Set the error callback.
    pub fn set_on_error(self, on_error: impl Fn(TError) + 'static) -> Self {
        RetrierConfig {
            on_error: Some(Rc::new(on_error)),
            ..self
        }
    }

    /// Set the retry policy.
    pub fn set_retry(self, retry: RetryOptions) -> Self {
        RetrierConfig { retry, ..self }
    }
}

impl<TData, TError> Default for RetrierConfig<TData, TError> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_error: None,
            retry: RetryOptions::default(),
        }
    }
}

impl<TData, TError> std::fmt::Debug for RetrierConfig<TData, TError> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrierConfig")
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("retry", &self.retry)
            .finish()
    }
}

type SettledHandle<TData, TError> =
    Shared<LocalBoxFuture<'static, Result<Result<TData, TError>, oneshot::Canceled>>>;

/// Executes an asynchronous producer, retrying failures with a delay and
/// settling exactly once.
///
/// Execution begins on construction via [`Retrier::spawn`]; there is no
/// separate start call. At most one of the configured callbacks fires, at
/// most once, over the lifetime of an executor instance.
pub struct Retrier<TData, TError> {
    failure_count: Rc<Cell<u32>>,
    settlement: Rc<Cell<Settlement>>,
    cancellation: Rc<Cell<Option<oneshot::Sender<()>>>>,
    settled: SettledHandle<TData, TError>,
}

impl<TData, TError> Clone for Retrier<TData, TError> {
    fn clone(&self) -> Self {
        Self {
            failure_count: Rc::clone(&self.failure_count),
            settlement: Rc::clone(&self.settlement),
            cancellation: Rc::clone(&self.cancellation),
            settled: self.settled.clone(),
        }
    }
}

impl<TData, TError> std::fmt::Debug for Retrier<TData, TError> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retrier")
            .field("failure_count", &self.failure_count.get())
            .field("settlement", &self.settlement.get())
            .finish()
    }
}

impl<TData, TError> Retrier<TData, TError>
where
    TData: QueryValue,
    TError: QueryError,
{
    /// Starts executing the producer on the current [`LocalSet`].
    ///
    /// A producer failing synchronously is expressed as an immediately ready
    /// `Err`, which enters the same retry path as an asynchronous rejection.
    ///
    /// [`LocalSet`]: tokio::task::LocalSet
    pub fn spawn<F, Fu>(producer: F, config: RetrierConfig<TData, TError>) -> Self
    where
        F: Fn() -> Fu + 'static,
        Fu: Future<Output = Result<TData, TError>> + 'static,
    {
        let failure_count = Rc::new(Cell::new(0));
        let settlement = Rc::new(Cell::new(Settlement::Pending));
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let (settle_tx, settle_rx) = oneshot::channel();

        let settled = settle_rx.boxed_local().shared();

        tokio::task::spawn_local(run(
            producer,
            config,
            failure_count.clone(),
            settlement.clone(),
            cancel_rx,
            settle_tx,
        ));

        Self {
            failure_count,
            settlement,
            cancellation: Rc::new(Cell::new(Some(cancel_tx))),
            settled,
        }
    }

    /// The number of failed attempts so far.
    pub fn failure_count(&self) -> u32 {
        self.failure_count.get()
    }

    /// The current settlement latch value.
    pub fn settlement(&self) -> Settlement {
        self.settlement.get()
    }

    /// Returns whether the executor has settled.
    pub fn is_resolved(&self) -> bool {
        !self.settlement.get().is_pending()
    }

    /// The pending result handle.
    ///
    /// Every clone of the returned future observes the same settlement. A
    /// cancelled executor resolves the handle to
    /// [`RetryError::Cancelled`].
    pub fn settled(&self) -> impl Future<Output = Result<TData, RetryError<TError>>> {
        self.settled.clone().map(|settled| match settled {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(error)) => Err(RetryError::Exhausted(error)),
            Err(oneshot::Canceled) => Err(RetryError::Cancelled),
        })
    }

    /// Aborts the in-flight attempt or pending delay.
    ///
    /// Neither callback fires and the settlement latch stays `Pending`.
    /// Returns `false` when the executor has already settled.
    pub fn cancel(&self) -> bool {
        if let Some(cancellation) = self.cancellation.take() {
            let cancelled = cancellation.send(());
            if cancelled.is_err() {
                tracing::warn!("failed to cancel fetch; executor already settled");
            }
            cancelled.is_ok()
        } else {
            false
        }
    }
}

async fn run<TData, TError, F, Fu>(
    producer: F,
    config: RetrierConfig<TData, TError>,
    failure_count: Rc<Cell<u32>>,
    settlement: Rc<Cell<Settlement>>,
    cancellation: oneshot::Receiver<()>,
    settle: oneshot::Sender<Result<TData, TError>>,
) where
    TData: QueryValue,
    TError: QueryError,
    F: Fn() -> Fu + 'static,
    Fu: Future<Output = Result<TData, TError>> + 'static,
{
    let RetrierConfig {
        on_success,
        on_error,
        retry,
    } = config;
    let mut settle = Some(settle);

    // A dropped cancellation handle must not abort a running executor; only
    // an explicit cancel() does.
    let mut cancelled = async move {
        if cancellation.await.is_err() {
            tracing::debug!("cancellation handle dropped; running to settlement");
            futures::future::pending::<()>().await;
        }
    }
    .boxed_local();

    loop {
        // A retry scheduled before settlement must not re-fire after it.
        if !settlement.get().is_pending() {
            return;
        }

        let attempt = std::pin::pin!(producer());
        let outcome = match select(attempt, cancelled).await {
            Either::Left((outcome, rest)) => {
                cancelled = rest;
                outcome
            }
            Either::Right(((), _)) => return,
        };

        match outcome {
            Ok(data) => {
                settlement.set(Settlement::Succeeded);
                if let Some(on_success) = &on_success {
                    on_success(data.clone());
                }
                if let Some(settle) = settle.take() {
                    let _ = settle.send(Ok(data));
                }
                return;
            }
            Err(error) => {
                if !settlement.get().is_pending() {
                    return;
                }

                let should_retry = retry.retry || failure_count.get() < retry.retry_times;
                if !should_retry {
                    settlement.set(Settlement::Failed);
                    if let Some(on_error) = &on_error {
                        on_error(error.clone());
                    }
                    if let Some(settle) = settle.take() {
                        let _ = settle.send(Err(error));
                    }
                    return;
                }

                failure_count.set(failure_count.get() + 1);

                let delay = std::pin::pin!(tokio::time::sleep(retry.retry_delay));
                match select(delay, cancelled).await {
                    Either::Left(((), rest)) => cancelled = rest,
                    Either::Right(((), _)) => return,
                }
            }
        }
    }
}
