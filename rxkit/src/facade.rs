// rxkit/src/facade.rs
//
// Result-set facades: one primary item stream plus the column-definitions,
// was-applied and execution-info streams of the same execution.
//

use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::errors::ReactiveError;
use crate::mapper::{map_entity, EntityMapper, GraphNode};
use crate::publisher::BoxPublisher;
use crate::stream::{adapt, ReactiveStream, Subscription};
use crate::subscriber::{Subscriber, SubscriptionHandle};
use crate::types::{ColumnDefinitions, ExecutionInfo, Row};

/// The four independent publishers produced by a statement executor for
/// one execution.
pub struct ReactiveResult {
    pub rows: BoxPublisher<Row>,
    pub column_definitions: BoxPublisher<ColumnDefinitions>,
    pub was_applied: BoxPublisher<bool>,
    pub execution_infos: BoxPublisher<ExecutionInfo>,
}

/// Typed view over one statement execution.
///
/// Each of the four streams is adapted separately and can be subscribed
/// independently, once. Cancelling one leaves the others untouched.
pub struct ResultFacade<T> {
    pub(crate) items: ReactiveStream<T>,
    pub(crate) column_definitions: ReactiveStream<ColumnDefinitions>,
    pub(crate) was_applied: ReactiveStream<bool>,
    pub(crate) execution_infos: ReactiveStream<ExecutionInfo>,
}

pub type RowFacade = ResultFacade<Row>;
pub type GraphFacade = ResultFacade<GraphNode>;

impl<T: Send + 'static> ResultFacade<T> {
    /// Wraps `result`, turning every row into `Ok(Some(item))`, `Ok(None)`
    /// to skip it, or an error that terminates the primary stream.
    pub fn new<F>(result: ReactiveResult, transform: F, context: Option<&ExecutionContext>) -> Self
    where
        F: Fn(Row) -> Result<Option<T>, ReactiveError> + Send + Sync + 'static,
    {
        let ReactiveResult {
            rows,
            column_definitions,
            was_applied,
            execution_infos,
        } = result;

        Self {
            items: adapt(rows)
                .try_filter_map(transform)
                .with_context_affinity(context),
            column_definitions: adapt(column_definitions).with_context_affinity(context),
            was_applied: adapt(was_applied).with_context_affinity(context),
            execution_infos: adapt(execution_infos).with_context_affinity(context),
        }
    }

    /// Subscribes to the primary stream.
    pub fn subscribe(&self) -> Subscription<T> {
        self.items.subscribe()
    }

    pub fn subscribe_with<S: Subscriber<T>>(&self, subscriber: S) -> SubscriptionHandle {
        self.items.subscribe_with(subscriber)
    }

    pub fn items(&self) -> &ReactiveStream<T> {
        &self.items
    }

    pub fn column_definitions(&self) -> &ReactiveStream<ColumnDefinitions> {
        &self.column_definitions
    }

    pub fn was_applied(&self) -> &ReactiveStream<bool> {
        &self.was_applied
    }

    pub fn execution_infos(&self) -> &ReactiveStream<ExecutionInfo> {
        &self.execution_infos
    }

    pub fn is_failed(&self) -> bool {
        self.items.is_failed()
    }

    /// Gives up the primary stream, e.g. to apply [`ReactiveStream::cache`].
    pub fn into_items(self) -> ReactiveStream<T> {
        self.items
    }
}

impl ResultFacade<Row> {
    pub fn rows(result: ReactiveResult, context: Option<&ExecutionContext>) -> Self {
        Self::new(result, |row| Ok(Some(row)), context)
    }
}

impl ResultFacade<GraphNode> {
    pub fn graph(result: ReactiveResult, context: Option<&ExecutionContext>) -> Self {
        Self::new(result, |row| GraphNode::from_row(&row).map(Some), context)
    }
}

impl<E: Send + 'static> ResultFacade<E> {
    /// Entity facade. Conditional-write acknowledgements carrying only the
    /// applied flag map to no entity and are skipped.
    pub fn mapped(
        result: ReactiveResult,
        mapper: Arc<dyn EntityMapper<E>>,
        context: Option<&ExecutionContext>,
    ) -> Self {
        Self::new(result, move |row| map_entity(mapper.as_ref(), &row), context)
    }
}
