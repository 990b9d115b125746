// In-memory publishers and fetchers used by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::errors::DriverError;
use crate::execution::{FetchedPage, PageFetcher};
use crate::facade::ReactiveResult;
use crate::publisher::{BoxPublisher, PagedPublisher};
use crate::session::StatementExecutor;
use crate::types::{ColumnDefinitions, ColumnSpec, ColumnValue, ExecutionInfo, Row, Statement};

/// Counters shared between a scripted publisher and its test.
#[derive(Debug, Default)]
pub struct Probe {
    fetches: AtomicUsize,
    cancels: AtomicUsize,
    threads: Mutex<Vec<String>>,
}

impl Probe {
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    /// Names of the threads that performed each fetch.
    pub fn threads(&self) -> Vec<String> {
        self.threads.lock().clone()
    }

    fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let name = std::thread::current()
            .name()
            .unwrap_or("unnamed")
            .to_string();
        self.threads.lock().push(name);
    }
}

/// Publisher that serves fixed pages and optionally fails once they run out.
pub struct ScriptedPublisher<T> {
    pages: VecDeque<Vec<T>>,
    failure: Option<DriverError>,
    probe: Arc<Probe>,
}

impl<T: Send + 'static> ScriptedPublisher<T> {
    pub fn new(pages: Vec<Vec<T>>) -> (Self, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        let publisher = Self {
            pages: pages.into(),
            failure: None,
            probe: probe.clone(),
        };
        (publisher, probe)
    }

    pub fn failing_after(pages: Vec<Vec<T>>, error: DriverError) -> (Self, Arc<Probe>) {
        let (mut publisher, probe) = Self::new(pages);
        publisher.failure = Some(error);
        (publisher, probe)
    }

    pub fn boxed(self) -> BoxPublisher<T> {
        Box::new(self)
    }
}

#[async_trait]
impl<T: Send + 'static> PagedPublisher<T> for ScriptedPublisher<T> {
    async fn next_page(&mut self) -> Result<Option<Vec<T>>, DriverError> {
        self.probe.record_fetch();
        tokio::task::yield_now().await;
        match self.pages.pop_front() {
            Some(page) => Ok(Some(page)),
            None => match self.failure.take() {
                Some(err) => Err(err),
                None => Ok(None),
            },
        }
    }

    fn cancel(&mut self) {
        self.probe.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Signals around a held-back page fetch.
#[derive(Debug, Default)]
pub struct Gate {
    pub started: Notify,
    pub open: Notify,
}

/// Publisher whose single page is held until the gate opens.
pub struct GatedPublisher<T> {
    page: Option<Vec<T>>,
    gate: Arc<Gate>,
    probe: Arc<Probe>,
}

impl<T: Send + 'static> GatedPublisher<T> {
    pub fn new(page: Vec<T>) -> (BoxPublisher<T>, Arc<Gate>, Arc<Probe>) {
        let gate = Arc::new(Gate::default());
        let probe = Arc::new(Probe::default());
        let publisher = Self {
            page: Some(page),
            gate: gate.clone(),
            probe: probe.clone(),
        };
        (Box::new(publisher), gate, probe)
    }
}

#[async_trait]
impl<T: Send + 'static> PagedPublisher<T> for GatedPublisher<T> {
    async fn next_page(&mut self) -> Result<Option<Vec<T>>, DriverError> {
        self.probe.record_fetch();
        let Some(page) = self.page.take() else {
            return Ok(None);
        };
        self.gate.started.notify_one();
        self.gate.open.notified().await;
        Ok(Some(page))
    }

    fn cancel(&mut self) {
        self.probe.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Splits `count` integers into pages of `page_size`.
pub fn numbered_pages(count: usize, page_size: usize) -> Vec<Vec<usize>> {
    (0..count)
        .collect::<Vec<_>>()
        .chunks(page_size)
        .map(|chunk| chunk.to_vec())
        .collect()
}

pub fn columns(names: &[(&str, &str)]) -> Arc<ColumnDefinitions> {
    Arc::new(ColumnDefinitions::new(
        names
            .iter()
            .map(|(name, typ)| ColumnSpec::new(*name, *typ))
            .collect(),
    ))
}

pub fn row(columns: &Arc<ColumnDefinitions>, values: Vec<ColumnValue>) -> Row {
    Row::new(columns.clone(), values)
}

/// Fetcher serving prepared pages of rows sharing one set of columns.
pub struct ScriptedFetcher {
    columns: Arc<ColumnDefinitions>,
    pages: VecDeque<Vec<Row>>,
    failure: Option<DriverError>,
    served: u32,
    probe: Arc<Probe>,
}

impl ScriptedFetcher {
    pub fn new(columns: Arc<ColumnDefinitions>, pages: Vec<Vec<Row>>) -> (Self, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        let fetcher = Self {
            columns,
            pages: pages.into(),
            failure: None,
            served: 0,
            probe: probe.clone(),
        };
        (fetcher, probe)
    }

    pub fn failing_after(
        columns: Arc<ColumnDefinitions>,
        pages: Vec<Vec<Row>>,
        error: DriverError,
    ) -> (Self, Arc<Probe>) {
        let (mut fetcher, probe) = Self::new(columns, pages);
        fetcher.failure = Some(error);
        (fetcher, probe)
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch_page(&mut self) -> Result<Option<FetchedPage>, DriverError> {
        self.probe.record_fetch();
        tokio::task::yield_now().await;
        let Some(rows) = self.pages.pop_front() else {
            return match self.failure.take() {
                Some(err) => Err(err),
                None => Ok(None),
            };
        };
        let execution_info = ExecutionInfo {
            page: self.served,
            tracing_id: None,
            warnings: Vec::new(),
            has_more_pages: !self.pages.is_empty(),
        };
        self.served += 1;
        Ok(Some(FetchedPage {
            columns: self.columns.clone(),
            rows,
            execution_info,
        }))
    }

    fn cancel(&mut self) {
        self.probe.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Executor answering every statement with one page of `rows`.
pub struct MockExecutor {
    pub rows: Vec<Row>,
    pub seen: Mutex<Vec<Statement>>,
}

impl MockExecutor {
    pub fn new(rows: Vec<Row>) -> Arc<Self> {
        Arc::new(Self {
            rows,
            seen: Mutex::new(Vec::new()),
        })
    }
}

impl StatementExecutor for MockExecutor {
    fn execute_reactive(&self, statement: &Statement) -> Result<ReactiveResult, DriverError> {
        self.seen.lock().push(statement.clone());
        if statement.query.trim().is_empty() {
            return Err(DriverError::Validation("empty query".to_string()));
        }
        let cols = self
            .rows
            .first()
            .map(|r| Arc::new(r.column_definitions().clone()))
            .unwrap_or_else(|| columns(&[]));
        let (fetcher, _) = ScriptedFetcher::new(cols, vec![self.rows.clone()]);
        Ok(ReactiveResult::from_fetcher(fetcher))
    }
}
