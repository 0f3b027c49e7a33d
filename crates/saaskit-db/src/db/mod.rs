//! Database providers for the data access layer
//!
//! Rows are `serde_json::Value` objects keyed by column name. Typed access goes
//! through [`from_row`] / [`to_row`] so services keep their own models.

pub mod identifier;
pub mod memory;
pub mod postgres;
pub mod provider;

pub use memory::{MemoryDatabaseProvider, RawFunction};
pub use postgres::PostgresDatabaseProvider;
pub use provider::DatabaseProvider;

use saaskit_core::AppError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Decode a row into a model
pub fn from_row<T: DeserializeOwned>(row: Value) -> Result<T, AppError> {
    serde_json::from_value(row).map_err(|e| AppError::database("decode", e))
}

/// Decode a list of rows into models
pub fn from_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, AppError> {
    rows.into_iter().map(from_row).collect()
}

/// Encode a model or request into a row object
pub fn to_row<T: Serialize>(value: &T) -> Result<Value, AppError> {
    let row = serde_json::to_value(value).map_err(|e| AppError::database("encode", e))?;
    if !row.is_object() {
        return Err(AppError::InvalidInput(
            "Row data must be a JSON object".to_string(),
        ));
    }
    Ok(row)
}
