use thiserror::Error;

/// Outcome taxonomy for the optimal-entry-time workflow.
///
/// Every variant except [`RequestError::Cancelled`] carries the exact text
/// shown in the status line; cancellation is silent and must never be
/// rendered as a failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// Missing target or release time. The remote endpoint is never contacted.
    #[error("Please select a site and choose a release time.")]
    Validation,

    /// Non-2xx response or a 2xx body carrying an error string; the
    /// remote-supplied message is surfaced verbatim.
    #[error("{0}")]
    Remote(String),

    /// 2xx response with neither an optimal time nor an error message.
    #[error("An unknown error occurred.")]
    UnknownBody,

    /// Collaborator unreachable or the response could not be read.
    #[error("An error occurred while fetching the optimal entry time.")]
    Network,

    /// This call was superseded or aborted by the caller.
    #[error("request cancelled")]
    Cancelled,
}
