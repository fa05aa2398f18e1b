// Store gateway trait: the seam between the query service and the backing store
use crate::error::AppError;
use crate::models::RowSet;

/// Executes ad-hoc SQL against a relational store
///
/// Values are dynamically typed; no schema is assumed.
#[async_trait::async_trait]
pub trait StoreGateway: Send + Sync {
    /// Execute a SQL query and collect every row
    async fn execute(&self, sql: &str) -> Result<RowSet, AppError>;

    /// Column names the query would produce, without running it
    async fn columns(&self, sql: &str) -> Result<Vec<String>, AppError>;

    /// Check that the store is reachable
    async fn ping(&self) -> Result<(), AppError>;

    /// Release the underlying connections
    async fn close(&self);
}
