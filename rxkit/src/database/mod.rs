pub mod scylla;
pub mod values;

pub use self::scylla::ScyllaConnection;
pub use values::{from_cql_value, to_cql_value};
