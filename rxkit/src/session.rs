use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::ReactiveConfig;
use crate::context::ExecutionContext;
use crate::errors::{DriverError, ReactiveError};
use crate::facade::{GraphFacade, ReactiveResult, ResultFacade, RowFacade};
use crate::mapper::EntityMapper;
use crate::types::Statement;

pub const HEALTH_CHECK_QUERY: &str = "SELECT now() FROM system.local";

/// Submits statements to the database driver.
///
/// Returning `Err` means the statement was rejected before any network
/// interaction; the session answers with a failed facade.
pub trait StatementExecutor: Send + Sync {
    fn execute_reactive(&self, statement: &Statement) -> Result<ReactiveResult, DriverError>;
}

/// Entry point handing out result facades for statements.
#[derive(Clone)]
pub struct ReactiveSession {
    executor: Arc<dyn StatementExecutor>,
    context: Option<ExecutionContext>,
    config: ReactiveConfig,
}

impl ReactiveSession {
    pub fn new(executor: Arc<dyn StatementExecutor>, context: Option<ExecutionContext>) -> Self {
        Self {
            executor,
            context,
            config: ReactiveConfig::default(),
        }
    }

    /// Builds a session from configuration. With context affinity enabled
    /// the caller's runtime is captured as the delivery context.
    pub fn from_config(executor: Arc<dyn StatementExecutor>, config: ReactiveConfig) -> Self {
        let context = if config.context_affinity {
            ExecutionContext::capture(config.context_name.clone())
        } else {
            None
        };
        debug!(
            "Reactive session created (context: {:?}, page size: {:?})",
            context.as_ref().map(ExecutionContext::name),
            config.page_size
        );
        Self {
            executor,
            context,
            config,
        }
    }

    pub fn with_config(mut self, config: ReactiveConfig) -> Self {
        self.config = config;
        self
    }

    /// Same executor, delivering on `context`.
    pub fn with_context(&self, context: ExecutionContext) -> Self {
        Self {
            executor: self.executor.clone(),
            context: Some(context),
            config: self.config.clone(),
        }
    }

    pub fn context(&self) -> Option<&ExecutionContext> {
        self.context.as_ref()
    }

    pub fn config(&self) -> &ReactiveConfig {
        &self.config
    }

    pub fn execute(&self, statement: &Statement) -> RowFacade {
        match self.submit(statement) {
            Ok(result) => ResultFacade::rows(result, self.context.as_ref()),
            Err(err) => rejected(statement, err),
        }
    }

    pub fn execute_mapped<E: Send + 'static>(
        &self,
        statement: &Statement,
        mapper: Arc<dyn EntityMapper<E>>,
    ) -> ResultFacade<E> {
        match self.submit(statement) {
            Ok(result) => ResultFacade::mapped(result, mapper, self.context.as_ref()),
            Err(err) => rejected(statement, err),
        }
    }

    pub fn execute_graph(&self, statement: &Statement) -> GraphFacade {
        match self.submit(statement) {
            Ok(result) => ResultFacade::graph(result, self.context.as_ref()),
            Err(err) => rejected(statement, err),
        }
    }

    pub async fn health_check(&self) -> Result<(), ReactiveError> {
        self.execute(&Statement::new(HEALTH_CHECK_QUERY))
            .to_single_value()
            .await?
            .map(|_| ())
            .ok_or(ReactiveError::EmptyResult)
    }

    fn submit(&self, statement: &Statement) -> Result<ReactiveResult, DriverError> {
        match (statement.page_size, self.config.page_size) {
            (None, Some(page_size)) => self
                .executor
                .execute_reactive(&statement.clone().with_page_size(page_size)),
            _ => self.executor.execute_reactive(statement),
        }
    }
}

fn rejected<T: Send + 'static>(statement: &Statement, err: DriverError) -> ResultFacade<T> {
    warn!("Statement rejected before execution: {} [{}]", err, statement.query);
    ResultFacade::failed(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{columns, row, MockExecutor};
    use crate::types::{ColumnValue, Row};

    fn one_row() -> Vec<Row> {
        let cols = columns(&[("now", "timeuuid")]);
        vec![row(&cols, vec![ColumnValue::Text("now".to_string())])]
    }

    #[tokio::test]
    async fn test_execute_delivers_rows() {
        let executor = MockExecutor::new(one_row());
        let session = ReactiveSession::new(executor.clone(), None);
        let rows = session
            .execute(&Statement::new("SELECT now() FROM system.local"))
            .items()
            .collect()
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_synchronous_rejection_yields_failed_facade() {
        let executor = MockExecutor::new(one_row());
        let session = ReactiveSession::new(executor, None);
        let facade = session.execute(&Statement::new("  "));

        assert!(facade.is_failed());
        let expected = ReactiveError::UpstreamFailure(DriverError::Validation("empty query".to_string()));
        assert_eq!(facade.to_single_value().await, Err(expected.clone()));
        assert_eq!(facade.was_applied().to_single_value().await, Err(expected));
    }

    #[tokio::test]
    async fn test_default_page_size_is_applied() {
        let executor = MockExecutor::new(one_row());
        let session = ReactiveSession::new(executor.clone(), None).with_config(ReactiveConfig {
            page_size: Some(250),
            ..Default::default()
        });

        session.execute(&Statement::new("SELECT * FROM ks.t"));
        session.execute(&Statement::new("SELECT * FROM ks.t").with_page_size(10));

        let seen = executor.seen.lock();
        assert_eq!(seen[0].page_size, Some(250));
        assert_eq!(seen[1].page_size, Some(10));
    }

    #[tokio::test]
    async fn test_from_config_captures_context() {
        let executor = MockExecutor::new(one_row());
        let session = ReactiveSession::from_config(executor.clone(), ReactiveConfig::default());
        assert_eq!(session.context().map(|c| c.name()), Some("request"));

        let detached = ReactiveSession::from_config(
            executor,
            ReactiveConfig {
                context_affinity: false,
                ..Default::default()
            },
        );
        assert!(detached.context().is_none());
    }

    #[tokio::test]
    async fn test_with_context_rebinds_session() {
        let executor = MockExecutor::new(one_row());
        let session = ReactiveSession::new(executor, None);
        let context = ExecutionContext::capture("per-request").unwrap();

        let bound = session.with_context(context);
        let facade = bound.execute(&Statement::new("SELECT 1"));
        assert_eq!(facade.items().context().map(|c| c.name()), Some("per-request"));
        assert!(session.context().is_none());
        assert_eq!(facade.items().drain().await, Ok(1));
    }

    #[tokio::test]
    async fn test_health_check() {
        let healthy = ReactiveSession::new(MockExecutor::new(one_row()), None);
        assert_eq!(healthy.health_check().await, Ok(()));

        let empty = ReactiveSession::new(MockExecutor::new(vec![]), None);
        assert_eq!(empty.health_check().await, Err(ReactiveError::EmptyResult));
    }
}
