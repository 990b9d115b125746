// rxkit/src/database/scylla.rs
//
// ScyllaDB statement executor. Each execution is fetched one page at a
// time through the driver's single-page query API.
//

use std::num::NonZeroUsize;
use std::ops::ControlFlow;
use std::sync::Arc;

use async_trait::async_trait;
use scylla::frame::response::result::CqlValue;
use scylla::query::Query;
use scylla::statement::PagingState;
use scylla::transport::execution_profile::ExecutionProfile;
use scylla::transport::session::PoolSize;
use scylla::{Session, SessionBuilder};
use tracing::{debug, info};

use super::values::{column_type_name, from_cql_value, to_cql_value};
use crate::config::DatabaseConfig;
use crate::errors::DriverError;
use crate::execution::{FetchedPage, PageFetcher};
use crate::facade::ReactiveResult;
use crate::session::StatementExecutor;
use crate::types::{ColumnDefinitions, ColumnSpec, ExecutionInfo, Row, Statement};

/// ScyllaDB connection wrapper
#[derive(Clone)]
pub struct ScyllaConnection {
    session: Arc<Session>,
    config: DatabaseConfig,
}

impl ScyllaConnection {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DriverError> {
        info!("Connecting to ScyllaDB cluster: {:?}", config.hosts);

        let pool_size = NonZeroUsize::new(config.pool_size as usize)
            .ok_or_else(|| DriverError::Validation("pool_size must be at least 1".to_string()))?;

        let profile = ExecutionProfile::builder()
            .request_timeout(Some(config.request_timeout))
            .build();

        let mut session_builder = SessionBuilder::new()
            .known_nodes(config.contact_points())
            .connection_timeout(config.connection_timeout)
            .pool_size(PoolSize::PerShard(pool_size))
            .default_execution_profile_handle(profile.into_handle())
            .use_keyspace(&config.keyspace, true);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            session_builder = session_builder.user(username, password);
        }

        let session = session_builder
            .build()
            .await
            .map_err(|e| DriverError::Connection(format!("Failed to connect to ScyllaDB: {}", e)))?;

        info!("Connected to ScyllaDB keyspace: {}", config.keyspace);

        Ok(Self {
            session: Arc::new(session),
            config: config.clone(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }
}

impl StatementExecutor for ScyllaConnection {
    fn execute_reactive(&self, statement: &Statement) -> Result<ReactiveResult, DriverError> {
        if statement.query.trim().is_empty() {
            return Err(DriverError::Validation("Query text is empty".to_string()));
        }

        let mut query = Query::new(statement.query.clone());
        if let Some(page_size) = statement.page_size {
            let page_size = i32::try_from(page_size)
                .ok()
                .filter(|size| *size > 0)
                .ok_or_else(|| DriverError::Validation(format!("Invalid page size: {}", page_size)))?;
            query.set_page_size(page_size);
        }
        query.set_tracing(statement.tracing);

        let values = statement
            .values
            .iter()
            .map(to_cql_value)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ReactiveResult::from_fetcher(ScyllaPageFetcher {
            session: self.session.clone(),
            query,
            values,
            paging_state: Some(PagingState::start()),
            page: 0,
        }))
    }
}

struct ScyllaPageFetcher {
    session: Arc<Session>,
    query: Query,
    values: Vec<Option<CqlValue>>,
    /// `None` once the last page was fetched.
    paging_state: Option<PagingState>,
    page: u32,
}

#[async_trait]
impl PageFetcher for ScyllaPageFetcher {
    async fn fetch_page(&mut self) -> Result<Option<FetchedPage>, DriverError> {
        let Some(paging_state) = self.paging_state.take() else {
            return Ok(None);
        };

        let (result, response) = self
            .session
            .query_single_page(self.query.clone(), &self.values, paging_state)
            .await?;

        let has_more_pages = match response.into_paging_control_flow() {
            ControlFlow::Continue(next) => {
                self.paging_state = Some(next);
                true
            }
            ControlFlow::Break(()) => false,
        };

        let columns = Arc::new(ColumnDefinitions::new(
            result
                .col_specs
                .iter()
                .map(|spec| ColumnSpec::new(spec.name.clone(), column_type_name(&spec.typ)))
                .collect(),
        ));
        let execution_info = ExecutionInfo {
            page: self.page,
            tracing_id: result.tracing_id,
            warnings: result.warnings.clone(),
            has_more_pages,
        };
        let rows = result
            .rows
            .unwrap_or_default()
            .into_iter()
            .map(|row| {
                let values = row.columns.into_iter().map(from_cql_value).collect();
                Row::new(columns.clone(), values)
            })
            .collect::<Vec<_>>();

        debug!("Fetched page {} with {} rows", self.page, rows.len());
        self.page += 1;

        Ok(Some(FetchedPage {
            columns,
            rows,
            execution_info,
        }))
    }

    fn cancel(&mut self) {
        self.paging_state = None;
    }
}
