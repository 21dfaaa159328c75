use crate::{Action, QueryState, QueryStatus};

/// The derived, caller-facing view of one query state transition.
///
/// `data`, `error` and `status` mirror the query's [`QueryState`]. The
/// boolean flags reflect the transition that produced the current state, not
/// merely the resulting status: `is_loading` is true exactly on the
/// notification carrying the fetch transition, and likewise for the terminal
/// flags. Listeners receive a result only when it differs from the
/// previously delivered one.
#[derive(Clone, PartialEq, Eq)]
pub struct QueryResult<TData, TError> {
    /// Last successfully fetched value, if any.
    pub data: Option<TData>,
    /// Last permanent failure, if any.
    pub error: Option<TError>,
    /// Current lifecycle status.
    pub status: QueryStatus,
    /// Whether this result was produced by a fetch transition.
    pub is_loading: bool,
    /// Whether this result was produced by an error transition.
    pub is_error: bool,
    /// Whether this result was produced by a success transition.
    pub is_success: bool,
}

impl<TData, TError> QueryResult<TData, TError>
where
    TData: Clone,
    TError: Clone,
{
    pub(crate) fn from_transition(
        state: &QueryState<TData, TError>,
        action: &Action<TData, TError>,
    ) -> Self {
        Self {
            data: state.data.clone(),
            error: state.error.clone(),
            status: state.status,
            is_loading: matches!(action, Action::Fetch),
            is_error: matches!(action, Action::Error(_)),
            is_success: matches!(action, Action::Success(_)),
        }
    }
}

impl<TData, TError> Default for QueryResult<TData, TError> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            status: QueryStatus::Idle,
            is_loading: false,
            is_error: false,
            is_success: false,
        }
    }
}

impl<TData, TError> std::fmt::Debug for QueryResult<TData, TError>
where
    TData: std::fmt::Debug,
    TError: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult")
            .field("data", &self.data)
            .field("error", &self.error)
            .field("status", &self.status)
            .field("is_loading", &self.is_loading)
            .field("is_error", &self.is_error)
            .field("is_success", &self.is_success)
            .finish()
    }
}
