//! Unified error type.

use thiserror::Error;

use crate::status::Status;

/// Any error a handler or filter may fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type flowing through the pipeline and out of the server.
///
/// Every failure a handler, filter or router produces ends up here and is
/// reported exactly once to the pipeline's exception funnel. Infrastructure
/// failures (binding a port, resolving an address) use the same type so that
/// callers deal with one `Result` shape.
#[derive(Debug, Error)]
pub enum Error {
    /// No registered pattern matched the method and path.
    #[error("no route matched: {method} {path}")]
    NoRouteMatched { method: String, path: String },

    /// A header was written after the response body started streaming.
    #[error("cannot write header `{name}` after the response was committed")]
    LateHeaderWrite { name: String },

    /// A leaf handler or filter failed, whether it returned an error or
    /// panicked, before or after its first suspension point.
    #[error("{0}")]
    Handler(BoxError),

    /// The exception funnel itself failed while mapping another error.
    #[error("exception funnel failed: {0}")]
    Funnel(Box<Error>),

    /// A route pattern could not be parsed.
    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: &'static str },

    /// A header name or value was rejected.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The request method is not one [`Method`](crate::Method) models.
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    /// Reading or producing a body stream failed.
    #[error("body stream: {0}")]
    Body(BoxError),

    /// The configured host and port do not resolve to a socket address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wraps any error value, or a plain message, as a handler failure.
    ///
    /// ```rust
    /// use ferrule::Error;
    ///
    /// let err = Error::handler("Asynchronous exception");
    /// assert_eq!(err.to_string(), "Asynchronous exception");
    /// ```
    pub fn handler(err: impl Into<BoxError>) -> Self {
        Self::Handler(err.into())
    }

    /// The status used when no exception funnel is installed.
    pub fn status(&self) -> Status {
        match self {
            Self::NoRouteMatched { .. } => Status::NOT_FOUND,
            Self::UnsupportedMethod(_) => Status::METHOD_NOT_ALLOWED,
            _ => Status::INTERNAL_SERVER_ERROR,
        }
    }
}
