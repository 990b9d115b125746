// rxkit/src/shape.rs
//
// Closed set of DAO result shapes and the dispatch over them.
//

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ReactiveError;
use crate::facade::{ResultFacade, RowFacade};
use crate::mapper::EntityMapper;
use crate::session::ReactiveSession;
use crate::types::{ColumnValue, Statement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultShape {
    Entity,
    OptionalEntity,
    RowStream,
    EntityStream,
    Boolean,
    Count,
    Void,
}

impl ResultShape {
    /// Whether results of this shape go through the entity mapper.
    pub fn requires_mapper(self) -> bool {
        matches!(
            self,
            ResultShape::Entity | ResultShape::OptionalEntity | ResultShape::EntityStream
        )
    }
}

impl fmt::Display for ResultShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultShape::Entity => "entity",
            ResultShape::OptionalEntity => "optional_entity",
            ResultShape::RowStream => "row_stream",
            ResultShape::EntityStream => "entity_stream",
            ResultShape::Boolean => "boolean",
            ResultShape::Count => "count",
            ResultShape::Void => "void",
        };
        f.write_str(name)
    }
}

/// A declared DAO operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaoMethod {
    pub name: String,
    pub query: String,
    pub shape: ResultShape,
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl DaoMethod {
    pub fn new(name: impl Into<String>, query: impl Into<String>, shape: ResultShape) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            shape,
            page_size: None,
        }
    }

    pub fn statement(&self, values: Vec<ColumnValue>) -> Statement {
        let statement = Statement::new(self.query.clone()).with_values(values);
        match self.page_size {
            Some(page_size) => statement.with_page_size(page_size),
            None => statement,
        }
    }
}

/// Outcome of a DAO call, one variant per [`ResultShape`].
pub enum DaoResult<E> {
    Entity(E),
    OptionalEntity(Option<E>),
    Rows(RowFacade),
    Entities(ResultFacade<E>),
    Boolean(bool),
    Count(i64),
    Void,
}

impl<E> DaoResult<E> {
    pub fn shape(&self) -> ResultShape {
        match self {
            DaoResult::Entity(_) => ResultShape::Entity,
            DaoResult::OptionalEntity(_) => ResultShape::OptionalEntity,
            DaoResult::Rows(_) => ResultShape::RowStream,
            DaoResult::Entities(_) => ResultShape::EntityStream,
            DaoResult::Boolean(_) => ResultShape::Boolean,
            DaoResult::Count(_) => ResultShape::Count,
            DaoResult::Void => ResultShape::Void,
        }
    }
}

impl<E> fmt::Debug for DaoResult<E>
where
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaoResult::Entity(entity) => f.debug_tuple("Entity").field(entity).finish(),
            DaoResult::OptionalEntity(entity) => f.debug_tuple("OptionalEntity").field(entity).finish(),
            DaoResult::Rows(_) => f.write_str("Rows(..)"),
            DaoResult::Entities(_) => f.write_str("Entities(..)"),
            DaoResult::Boolean(applied) => f.debug_tuple("Boolean").field(applied).finish(),
            DaoResult::Count(count) => f.debug_tuple("Count").field(count).finish(),
            DaoResult::Void => f.write_str("Void"),
        }
    }
}

impl ReactiveSession {
    /// Runs `method` and shapes its result. Streaming shapes hand back the
    /// live facade; every other shape is resolved here.
    pub async fn run_dao<E: Send + 'static>(
        &self,
        method: &DaoMethod,
        values: Vec<ColumnValue>,
        mapper: Arc<dyn EntityMapper<E>>,
    ) -> Result<DaoResult<E>, ReactiveError> {
        debug!("Running DAO method '{}' ({})", method.name, method.shape);
        let statement = method.statement(values);

        let result = match method.shape {
            ResultShape::Entity => {
                let entity = self.execute_mapped(&statement, mapper).to_entity().await?;
                DaoResult::Entity(entity.ok_or(ReactiveError::EmptyResult)?)
            }
            ResultShape::OptionalEntity => {
                DaoResult::OptionalEntity(self.execute_mapped(&statement, mapper).to_entity().await?)
            }
            ResultShape::RowStream => DaoResult::Rows(self.execute(&statement)),
            ResultShape::EntityStream => DaoResult::Entities(self.execute_mapped(&statement, mapper)),
            ResultShape::Boolean => DaoResult::Boolean(self.execute(&statement).to_boolean().await?),
            ResultShape::Count => DaoResult::Count(self.execute(&statement).to_count().await?),
            ResultShape::Void => {
                self.execute(&statement).items().drain().await?;
                DaoResult::Void
            }
        };
        Ok(result)
    }
}
