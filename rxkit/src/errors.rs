use thiserror::Error;

/// Errors reported by the statement executor and its page publishers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("Query error: {0}")]
    Query(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),
}

#[cfg(feature = "scylla")]
impl From<scylla::transport::errors::QueryError> for DriverError {
    fn from(err: scylla::transport::errors::QueryError) -> Self {
        DriverError::Query(err.to_string())
    }
}

/// Terminal error signal of a reactive stream.
///
/// Cloneable so that a failed facade can replay the same error to every
/// subscriber.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReactiveError {
    #[error("Upstream failure: {0}")]
    UpstreamFailure(#[source] DriverError),

    #[error("Empty result: expected exactly one row")]
    EmptyResult,

    #[error("Unexpected column type: expected {expected}, found {found}")]
    UnexpectedColumnType {
        expected: &'static str,
        found: String,
    },

    #[error("Stream already subscribed; it supports a single subscriber")]
    DoubleSubscription,

    #[error("Execution context '{0}' is no longer available")]
    ContextUnavailable(String),

    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<DriverError> for ReactiveError {
    fn from(err: DriverError) -> Self {
        ReactiveError::UpstreamFailure(err)
    }
}

impl From<serde_json::Error> for ReactiveError {
    fn from(err: serde_json::Error) -> Self {
        ReactiveError::Mapping(err.to_string())
    }
}
