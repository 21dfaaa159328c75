use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use futures::StreamExt;
use futures_channel::mpsc;
use thiserror::Error;
use tokio::task::LocalSet;

use query_core::{QueryObserver, QueryObserverOptions, QueryResult, QueryStatus, RetryOptions};

#[derive(Debug, Clone, PartialEq)]
struct Payload {
    json: String,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("request failed: {0}")]
struct FetchError(String);

type Results<TData> = mpsc::UnboundedReceiver<QueryResult<TData, FetchError>>;

fn channel_listener<TData: Clone + 'static>() -> (
    Box<dyn Fn(&QueryResult<TData, FetchError>)>,
    Results<TData>,
) {
    let (tx, rx) = mpsc::unbounded();
    let listener = move |result: &QueryResult<TData, FetchError>| {
        let _ = tx.unbounded_send(result.clone());
    };
    (Box::new(listener), rx)
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn fetch_delivers_loading_then_success() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let (listener, mut results) = channel_listener();

            let observer = QueryObserver::new(
                || async {
                    Ok(Payload {
                        json: "a".to_string(),
                    })
                },
                QueryObserverOptions::default(),
            );
            let _subscription = observer.subscribe(listener);

            observer.fetch();

            let loading = results.next().await.expect("loading notification");
            assert_eq!(loading.status, QueryStatus::Loading);
            assert!(loading.is_loading);
            assert!(!loading.is_success);
            assert_eq!(loading.data, None);
            assert_eq!(loading.error, None);

            let loaded = results.next().await.expect("success notification");
            assert_eq!(loaded.status, QueryStatus::Success);
            assert!(loaded.is_success);
            assert!(!loaded.is_loading);
            assert_eq!(
                loaded.data,
                Some(Payload {
                    json: "a".to_string()
                })
            );
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn default_policy_surfaces_failure_after_four_attempts() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let (listener, mut results) = channel_listener::<i32>();
            let attempts = Rc::new(Cell::new(0u32));
            let started = tokio::time::Instant::now();

            let observer = QueryObserver::new(
                {
                    let attempts = attempts.clone();
                    move || {
                        attempts.set(attempts.get() + 1);
                        async { Err(FetchError("Whoops".to_string())) }
                    }
                },
                QueryObserverOptions::default(),
            );
            let _subscription = observer.subscribe(listener);

            observer.fetch();

            let loading = results.next().await.expect("loading notification");
            assert!(loading.is_loading);

            let failed = results.next().await.expect("error notification");
            assert_eq!(failed.status, QueryStatus::Error);
            assert!(failed.is_error);
            assert_eq!(failed.error, Some(FetchError("Whoops".to_string())));
            assert_eq!(failed.data, None);

            assert_eq!(attempts.get(), 4, "initial attempt plus three retries");
            assert_eq!(
                started.elapsed(),
                Duration::from_millis(3000),
                "a full default delay before each retry"
            );

            // Intermediate failures stay invisible and nothing follows the
            // terminal notification.
            assert!(results.try_next().is_err(), "no further notifications");
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn fetch_on_mount_needs_no_explicit_fetch() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let (listener, mut results) = channel_listener();

            let _observer = QueryObserver::new(
                || async { Ok("x") },
                QueryObserverOptions::default()
                    .set_fetch_on_mount(true)
                    .add_listener(listener),
            );

            let loading = results.next().await.expect("loading notification");
            assert!(loading.is_loading);

            let loaded = results.next().await.expect("success notification");
            assert!(loaded.is_success);
            assert_eq!(loaded.data, Some("x"));
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn refetch_retains_previous_data_while_loading() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let (listener, mut results) = channel_listener();

            let observer = QueryObserver::new(
                || async { Ok("same") },
                QueryObserverOptions::default(),
            );
            let _subscription = observer.subscribe(listener);

            observer.fetch();
            let first_loading = results.next().await.expect("first loading");
            assert_eq!(first_loading.data, None);
            let loaded = results.next().await.expect("first success");
            assert_eq!(loaded.data, Some("same"));

            observer.refetch();

            let second_loading = results.next().await.expect("second loading");
            assert!(second_loading.is_loading);
            assert_eq!(
                second_loading.data,
                Some("same"),
                "data fetched earlier stays visible while reloading"
            );

            // The transition changed in between, so the repeated success view
            // is delivered again even though it matches the first one.
            let reloaded = results.next().await.expect("second success");
            assert_eq!(reloaded, loaded);
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn stale_error_survives_a_new_fetch_cycle() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let (listener, mut results) = channel_listener();
            let healthy = Rc::new(Cell::new(false));

            let observer = QueryObserver::new(
                {
                    let healthy = healthy.clone();
                    move || {
                        let healthy = healthy.get();
                        async move {
                            if healthy {
                                Ok("recovered")
                            } else {
                                Err(FetchError("down".to_string()))
                            }
                        }
                    }
                },
                QueryObserverOptions::default()
                    .set_retry(RetryOptions::default().set_retry_times(0)),
            );
            let _subscription = observer.subscribe(listener);

            observer.fetch();
            let _loading = results.next().await.expect("loading");
            let failed = results.next().await.expect("failure");
            assert_eq!(failed.error, Some(FetchError("down".to_string())));

            healthy.set(true);
            observer.refetch();

            let retrying = results.next().await.expect("second loading");
            assert!(retrying.is_loading);
            assert_eq!(
                retrying.error,
                Some(FetchError("down".to_string())),
                "a new in-flight fetch does not clear the stale error"
            );

            let recovered = results.next().await.expect("recovery");
            assert!(recovered.is_success);
            assert_eq!(recovered.data, Some("recovered"));
            assert_eq!(
                recovered.error,
                Some(FetchError("down".to_string())),
                "success overwrites data and status only"
            );
        })
        .await;
}
