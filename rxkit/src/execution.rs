// rxkit/src/execution.rs
//
// Splits one page-at-a-time execution into the four publishers of a
// ReactiveResult. The rows publisher drives the fetching; the metadata
// publishers observe what it has fetched so far.
//

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use crate::errors::DriverError;
use crate::facade::ReactiveResult;
use crate::publisher::PagedPublisher;
use crate::types::{ColumnDefinitions, ExecutionInfo, Row, APPLIED_COLUMN};

/// One page returned by a driver execution.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub columns: Arc<ColumnDefinitions>,
    pub rows: Vec<Row>,
    pub execution_info: ExecutionInfo,
}

/// Page-at-a-time access to a single statement execution.
#[async_trait]
pub trait PageFetcher: Send + 'static {
    /// Fetches the next page, `Ok(None)` once the result is exhausted.
    async fn fetch_page(&mut self) -> Result<Option<FetchedPage>, DriverError>;

    fn cancel(&mut self) {}
}

#[derive(Debug, Default)]
struct Progress {
    columns: Option<ColumnDefinitions>,
    was_applied: Option<bool>,
    infos: Vec<ExecutionInfo>,
    finished: bool,
    failure: Option<DriverError>,
}

fn column_definitions(progress: &Progress) -> &[ColumnDefinitions] {
    progress.columns.as_slice()
}

fn was_applied(progress: &Progress) -> &[bool] {
    progress.was_applied.as_slice()
}

fn execution_infos(progress: &Progress) -> &[ExecutionInfo] {
    &progress.infos
}

/// Applied flag of a response: the value of a leading `[applied]` column,
/// `true` for anything else.
fn applied_flag(rows: &[Row]) -> bool {
    rows.first()
        .filter(|row| {
            row.column_definitions()
                .columns
                .first()
                .is_some_and(|spec| spec.name == APPLIED_COLUMN)
        })
        .and_then(Row::applied)
        .unwrap_or(true)
}

struct RowsPublisher<F> {
    fetcher: F,
    progress: watch::Sender<Progress>,
}

#[async_trait]
impl<F: PageFetcher> PagedPublisher<Row> for RowsPublisher<F> {
    async fn next_page(&mut self) -> Result<Option<Vec<Row>>, DriverError> {
        match self.fetcher.fetch_page().await {
            Ok(Some(page)) => {
                self.progress.send_modify(|progress| {
                    if progress.columns.is_none() {
                        progress.columns = Some(page.columns.as_ref().clone());
                        progress.was_applied = Some(applied_flag(&page.rows));
                    }
                    progress.infos.push(page.execution_info.clone());
                });
                Ok(Some(page.rows))
            }
            Ok(None) => {
                self.progress.send_modify(|progress| progress.finished = true);
                Ok(None)
            }
            Err(err) => {
                debug!("Page fetch failed: {}", err);
                self.progress
                    .send_modify(|progress| progress.failure = Some(err.clone()));
                Err(err)
            }
        }
    }

    fn cancel(&mut self) {
        self.fetcher.cancel();
    }
}

struct FacetPublisher<T> {
    progress: watch::Receiver<Progress>,
    select: fn(&Progress) -> &[T],
    delivered: usize,
    limit: Option<usize>,
}

impl<T> FacetPublisher<T> {
    fn new(progress: watch::Receiver<Progress>, select: fn(&Progress) -> &[T], limit: Option<usize>) -> Self {
        Self {
            progress,
            select,
            delivered: 0,
            limit,
        }
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> PagedPublisher<T> for FacetPublisher<T> {
    async fn next_page(&mut self) -> Result<Option<Vec<T>>, DriverError> {
        if self.limit.is_some_and(|limit| self.delivered >= limit) {
            return Ok(None);
        }
        let select = self.select;
        let delivered = self.delivered;

        let ready = self
            .progress
            .wait_for(|p| select(p).len() > delivered || p.finished || p.failure.is_some())
            .await
            .is_ok();
        if !ready {
            // rows publisher dropped before producing this element
            return Ok(None);
        }

        let outcome = {
            let progress = self.progress.borrow();
            let fresh = select(&progress)[delivered..].to_vec();
            if !fresh.is_empty() {
                Ok(Some(fresh))
            } else if let Some(err) = &progress.failure {
                Err(err.clone())
            } else {
                Ok(None)
            }
        };

        if let Ok(Some(fresh)) = &outcome {
            self.delivered += fresh.len();
        }
        outcome
    }
}

impl ReactiveResult {
    /// Builds the four facets over one execution driven by `fetcher`.
    ///
    /// Column definitions and the applied flag come from the first page;
    /// one execution info is published per page. None of the metadata
    /// facets makes progress until the rows facet is consumed.
    pub fn from_fetcher<F: PageFetcher>(fetcher: F) -> Self {
        let (tx, rx) = watch::channel(Progress::default());
        Self {
            rows: Box::new(RowsPublisher {
                fetcher,
                progress: tx,
            }),
            column_definitions: Box::new(FacetPublisher::new(rx.clone(), column_definitions, Some(1))),
            was_applied: Box::new(FacetPublisher::new(rx.clone(), was_applied, Some(1))),
            execution_infos: Box::new(FacetPublisher::new(rx, execution_infos, None)),
        }
    }
}
