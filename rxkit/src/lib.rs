// rxkit/src/lib.rs
//
// Reactive result-set layer for CQL drivers: paged publishers adapted into
// demand-driven streams, delivered on the caller's execution context.
//

pub mod config;
pub mod context;
pub mod errors;
pub mod execution;
pub mod extract;
pub mod facade;
pub mod failed;
pub mod mapper;
pub mod metrics;
pub mod publisher;
pub mod session;
pub mod shape;
pub mod stream;
pub mod subscriber;
pub mod types;

#[cfg(feature = "scylla")]
pub mod database;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{DatabaseConfig, ObservabilityConfig, ReactiveConfig};
pub use context::ExecutionContext;
pub use errors::{DriverError, ReactiveError};
pub use execution::{FetchedPage, PageFetcher};
pub use extract::count_of;
pub use facade::{GraphFacade, ReactiveResult, ResultFacade, RowFacade};
pub use failed::failed_facade;
pub use mapper::{map_entity, EntityMapper, GraphNode};
pub use publisher::{BoxPublisher, PagedPublisher, StaticPublisher};
pub use session::{ReactiveSession, StatementExecutor};
pub use shape::{DaoMethod, DaoResult, ResultShape};
pub use stream::{adapt, ReactiveStream, Subscription};
pub use subscriber::{Subscriber, SubscriptionHandle, UNBOUNDED};
pub use types::{ColumnDefinitions, ColumnSpec, ColumnValue, ExecutionInfo, Row, Statement};

#[cfg(feature = "scylla")]
pub use database::ScyllaConnection;
