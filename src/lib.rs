#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! # About Query Core
//!
//! Query core is a minimal asynchronous state management primitive.
//!
//! Heavily inspired by [Tanstack Query](https://tanstack.com/query/latest/).
//!
//! It executes a user-supplied asynchronous producer, tracks its lifecycle
//! (idle → loading → success/error), transparently retries transient failures
//! with a delay, and fans every state transition out to subscribed listeners
//! as a deduplicated [`QueryResult`] snapshot.
//!
//! A query provides:
//! - a canonical state machine over `data`, `error` and [`QueryStatus`]
//! - retry with a configurable delay and budget
//! - exactly-once settlement per fetch cycle
//! - listener subscriptions with result deduplication
//!
//! ## The main entry points are:
//! - [`QueryObserver`] - **Recommended**: wraps a [`Query`] and delivers
//!   deduplicated, flag-annotated results to subscribed listeners.
//! - [`Query`] - the underlying state machine, for callers that want raw
//!   transitions.
//! - [`Retrier`] - the retrying executor, for callers that only need
//!   retry-with-delay around a single async call.
//!
//! # A Simple Example
//!
//! Constructing an observer and subscribing is synchronous:
//!
//! ```rust
//! use query_core::{QueryObserver, QueryObserverOptions};
//!
//! let observer = QueryObserver::new(
//!     || async { Ok::<_, String>(42) },
//!     QueryObserverOptions::default(),
//! );
//!
//! let subscription = observer.subscribe(|result| {
//!     println!("status: {:?}", result.status);
//! });
//!
//! assert!(observer.has_listeners());
//! subscription.unsubscribe();
//! assert!(!observer.has_listeners());
//! ```
//!
//! Fetching runs on the current thread's [`LocalSet`](tokio::task::LocalSet):
//!
//! ```rust
//! use query_core::{QueryObserver, QueryObserverOptions, QueryStatus};
//! use futures_channel::mpsc;
//! use futures::StreamExt;
//!
//! # tokio::runtime::Builder::new_current_thread()
//! #     .enable_time()
//! #     .build()
//! #     .unwrap()
//! #     .block_on(async {
//! let local = tokio::task::LocalSet::new();
//! local
//!     .run_until(async {
//!         let (tx, mut rx) = mpsc::unbounded();
//!
//!         let observer = QueryObserver::new(
//!             || async { Ok::<_, String>("hello") },
//!             QueryObserverOptions::default(),
//!         );
//!         let _subscription = observer.subscribe(move |result| {
//!             let _ = tx.unbounded_send(result.clone());
//!         });
//!
//!         observer.fetch();
//!
//!         let loading = rx.next().await.unwrap();
//!         assert_eq!(loading.status, QueryStatus::Loading);
//!
//!         let loaded = rx.next().await.unwrap();
//!         assert_eq!(loaded.data, Some("hello"));
//!     })
//!     .await;
//! # });
//! ```

mod query;
mod query_observer;
mod query_options;
mod query_result;
mod query_state;
mod retrier;
mod subscribable;

pub use query::*;
pub use query_observer::*;
pub use query_options::*;
pub use query_result::*;
pub use query_state::*;
pub use retrier::*;
pub use subscribable::*;

/// Convenience trait for query data requirements.
pub trait QueryValue: std::fmt::Debug + Clone + PartialEq + 'static {}
impl<V> QueryValue for V where V: std::fmt::Debug + Clone + PartialEq + 'static {}

/// Convenience trait for query error requirements.
pub trait QueryError: std::fmt::Debug + Clone + PartialEq + 'static {}
impl<E> QueryError for E where E: std::fmt::Debug + Clone + PartialEq + 'static {}
