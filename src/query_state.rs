/// The lifecycle status of a query.
///
/// Each variant corresponds to a particular point in a query's lifecycle,
/// starting from creation and covering all transitions up to the terminal
/// outcome of a fetch cycle.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
    /// The initial status of a query upon its creation.
    ///
    /// No fetch has been initiated yet. This is the only pre-fetch status;
    /// once a fetch begins a query never returns to it.
    #[default]
    Idle,

    /// A fetch cycle is in flight.
    ///
    /// Covers the entire active attempt, including every retry. A query holds
    /// this status from the moment a fetch is dispatched until the attempt
    /// settles with success or permanent failure.
    Loading,

    /// The most recent fetch cycle settled with a permanent failure.
    ///
    /// Terminal per fetch cycle until a new fetch begins.
    Error,

    /// The most recent fetch cycle settled successfully.
    ///
    /// Terminal per fetch cycle until a new fetch begins.
    Success,
}

impl std::fmt::Debug for QueryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Loading => write!(f, "Loading"),
            Self::Error => write!(f, "Error"),
            Self::Success => write!(f, "Success"),
        }
    }
}

/// The canonical state of one query.
///
/// `data` holds the last successfully fetched value and is retained across
/// subsequent fetches until overwritten. `error` holds the last permanent
/// failure; a new fetch attempt does not clear it, so a stale error can
/// coexist with an in-flight load.
#[derive(Clone, PartialEq, Eq)]
pub struct QueryState<TData, TError> {
    /// Last successfully fetched value, if any.
    pub data: Option<TData>,
    /// Last permanent failure, if any.
    pub error: Option<TError>,
    /// Current lifecycle status.
    pub status: QueryStatus,
}

impl<TData, TError> Default for QueryState<TData, TError> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            status: QueryStatus::Idle,
        }
    }
}

impl<TData, TError> std::fmt::Debug for QueryState<TData, TError>
where
    TData: std::fmt::Debug,
    TError: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryState")
            .field("data", &self.data)
            .field("error", &self.error)
            .field("status", &self.status)
            .finish()
    }
}

/// A state transition of a query.
///
/// Consumed by [`Query::reduce`](crate::Query::reduce) to produce the next
/// state, and handed to observers so they can tell which transition occurred.
/// The `is_loading`/`is_error`/`is_success` flags of a
/// [`QueryResult`](crate::QueryResult) reflect the most recent transition,
/// not merely the resulting status.
#[derive(Clone, PartialEq, Eq)]
pub enum Action<TData, TError> {
    /// A fetch cycle began.
    Fetch,
    /// The fetch cycle settled successfully with the produced value.
    Success(TData),
    /// The fetch cycle settled with a permanent failure.
    Error(TError),
}

impl<TData, TError> std::fmt::Debug for Action<TData, TError>
where
    TData: std::fmt::Debug,
    TError: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch => write!(f, "Fetch"),
            Self::Success(data) => f.debug_tuple("Success").field(data).finish(),
            Self::Error(error) => f.debug_tuple("Error").field(error).finish(),
        }
    }
}
