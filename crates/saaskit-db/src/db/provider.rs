use async_trait::async_trait;
use saaskit_core::models::{PaginatedResult, QueryOptions};
use saaskit_core::AppError;
use serde_json::{Map, Value};

/// Table-generic storage over JSON rows.
///
/// Single-record lookups return `Ok(None)` when nothing matches. Vendor failures
/// are `AppError::Database` with an operation prefix (`Database insert error: ...`).
/// Table and column names are validated identifiers; anything else is rejected
/// with `AppError::InvalidInput` before reaching the store.
#[async_trait]
pub trait DatabaseProvider: Send + Sync {
    /// Rows of `table` whose columns equal every filter value
    async fn query(&self, table: &str, filters: &Map<String, Value>) -> Result<Vec<Value>, AppError>;

    /// One page of matching rows plus the total count of matching rows
    async fn query_with_pagination(
        &self,
        table: &str,
        options: &QueryOptions,
    ) -> Result<PaginatedResult<Value>, AppError>;

    async fn get_by_id(&self, table: &str, id: &str) -> Result<Option<Value>, AppError>;

    /// Insert a row and return it as stored
    async fn insert(&self, table: &str, data: Value) -> Result<Value, AppError>;

    /// Apply the given columns to the row with `id` and return the updated row.
    /// A missing row is `AppError::NotFound`.
    async fn update(&self, table: &str, id: &str, data: Value) -> Result<Value, AppError>;

    async fn delete(&self, table: &str, id: &str) -> Result<(), AppError>;

    /// Call a stored function that takes and returns JSON
    async fn raw(&self, function: &str, params: Value) -> Result<Value, AppError>;

    /// Atomically add `amount` to `column` of the row identified by `key`,
    /// creating the row with `column = amount` when it does not exist.
    async fn increment(
        &self,
        table: &str,
        key: &Map<String, Value>,
        column: &str,
        amount: i64,
    ) -> Result<Value, AppError>;

    /// Cheap round trip used by readiness probes
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
