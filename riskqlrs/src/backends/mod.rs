//! Database backend implementations.
//!
//! Each backend is implemented in its own file and gated behind a feature flag.

use async_trait::async_trait;

use crate::error::Result;
use crate::executor::QueryResult;
use crate::schema_cache::TableSchema;

/// Unified interface for all database backends.
#[async_trait]
pub trait BackendConnection: Send + Sync {
    /// Short backend name used in logs and as the schema cache scope.
    fn name(&self) -> &str;

    /// Base tables visible to the connection, in name order.
    async fn list_tables(&self) -> Result<Vec<String>>;

    async fn fetch_schema(&self, table: &str) -> Result<TableSchema>;

    /// Execute SQL and return at most `row_limit` rows. Driver failures are
    /// reported as `RiskqlError::Execution` carrying the driver message.
    async fn execute_sql(&self, sql: &str, row_limit: usize) -> Result<QueryResult>;
}

// Feature-gated backend implementations
#[cfg(feature = "duckdb")]
mod duckdb;
#[cfg(feature = "duckdb")]
pub use duckdb::DuckDbConnection;

#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "postgres")]
pub use postgres::PostgresConnection;
