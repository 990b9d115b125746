// rxkit/src/extract.rs
//
// Single-value extraction over streams and facades.
//

use futures_util::StreamExt;

use crate::errors::ReactiveError;
use crate::facade::ResultFacade;
use crate::stream::ReactiveStream;
use crate::types::{ColumnValue, Row};

impl<T: Send + 'static> ReactiveStream<T> {
    /// Takes the first item and cancels the rest. `Ok(None)` if the stream
    /// completed empty.
    pub async fn to_single_value(&self) -> Result<Option<T>, ReactiveError> {
        let mut subscription = self.subscribe();
        let first = subscription.next().await.transpose();
        subscription.cancel();
        first
    }

    /// Consumes the stream to completion, returning the item count.
    pub async fn drain(&self) -> Result<usize, ReactiveError> {
        let mut subscription = self.subscribe();
        let mut count = 0;
        while let Some(item) = subscription.next().await {
            item?;
            count += 1;
        }
        Ok(count)
    }

    pub async fn collect(&self) -> Result<Vec<T>, ReactiveError> {
        let mut subscription = self.subscribe();
        let mut items = Vec::new();
        while let Some(item) = subscription.next().await {
            items.push(item?);
        }
        Ok(items)
    }
}

impl<T: Send + 'static> ResultFacade<T> {
    pub async fn to_single_value(&self) -> Result<Option<T>, ReactiveError> {
        self.items.to_single_value().await
    }

    /// First entity of the result, `None` when the result holds no entity
    /// (including a successful conditional write).
    pub async fn to_entity(&self) -> Result<Option<T>, ReactiveError> {
        self.items.to_single_value().await
    }

    /// Applied flag of a conditional write. The primary stream is consumed
    /// first; the flag is only read once the response has completed.
    pub async fn to_boolean(&self) -> Result<bool, ReactiveError> {
        self.items.drain().await?;
        self.was_applied
            .to_single_value()
            .await?
            .ok_or(ReactiveError::EmptyResult)
    }
}

impl ResultFacade<Row> {
    /// Value of an aggregate such as `SELECT COUNT(*)`.
    pub async fn to_count(&self) -> Result<i64, ReactiveError> {
        let row = self
            .to_single_value()
            .await?
            .ok_or(ReactiveError::EmptyResult)?;
        count_of(&row)
    }
}

/// Reads the first column of `row` as a count. `int` values are widened.
pub fn count_of(row: &Row) -> Result<i64, ReactiveError> {
    match row.get_by_index(0) {
        Some(ColumnValue::BigInt(count)) => Ok(*count),
        Some(ColumnValue::Int(count)) => Ok(i64::from(*count)),
        other => Err(ReactiveError::UnexpectedColumnType {
            expected: "bigint",
            found: other.map_or("nothing", ColumnValue::type_name).to_string(),
        }),
    }
}
