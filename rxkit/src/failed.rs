use tracing::debug;

use crate::errors::ReactiveError;
use crate::facade::ResultFacade;
use crate::stream::ReactiveStream;

impl<T: Send + 'static> ResultFacade<T> {
    /// Facade for a request rejected before execution. Every stream, on
    /// every subscription, terminates with `error`; nothing is fetched.
    pub fn failed(error: impl Into<ReactiveError>) -> Self {
        let error = error.into();
        debug!("Building failed result facade: {}", error);
        Self {
            items: ReactiveStream::failed(error.clone()),
            column_definitions: ReactiveStream::failed(error.clone()),
            was_applied: ReactiveStream::failed(error.clone()),
            execution_infos: ReactiveStream::failed(error),
        }
    }
}

pub fn failed_facade<T: Send + 'static>(error: impl Into<ReactiveError>) -> ResultFacade<T> {
    ResultFacade::failed(error)
}
