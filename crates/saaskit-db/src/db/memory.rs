//! In-memory implementation of [`DatabaseProvider`] for tests and local runs.
//!
//! All tables live behind one `RwLock`; `increment` holds the write lock for
//! the whole read-modify-write. `user_profiles`, `user_profiles_view` and
//! `profiles` share the same storage since there is no separate view here.

use super::identifier::{row_object, validate_identifier, write_relation};
use super::provider::DatabaseProvider;
use async_trait::async_trait;
use chrono::Utc;
use saaskit_core::models::{PaginatedResult, QueryOptions};
use saaskit_core::AppError;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Stored function callable through [`DatabaseProvider::raw`]
pub type RawFunction = Arc<dyn Fn(Value) -> Result<Value, AppError> + Send + Sync>;

#[derive(Default, Clone)]
pub struct MemoryDatabaseProvider {
    tables: Arc<RwLock<HashMap<String, Vec<Value>>>>,
    functions: Arc<RwLock<HashMap<String, RawFunction>>>,
}

fn field<'a>(row: &'a Value, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

fn matches_filters(row: &Value, filters: &Map<String, Value>) -> bool {
    filters
        .iter()
        .all(|(column, expected)| values_equal(field(row, column), expected))
}

/// Equality that treats numerically equal JSON numbers as equal (1 == 1.0)
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Nulls sort first, numbers numerically, everything else by text
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => text_of(a).cmp(&text_of(b)),
    }
}

fn now() -> Value {
    Value::String(Utc::now().to_rfc3339())
}

fn not_found(table: &str, id: &str) -> AppError {
    AppError::NotFound(format!("Record {} not found in {}", id, table))
}

impl MemoryDatabaseProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function for [`DatabaseProvider::raw`]
    pub async fn register_function(&self, name: &str, function: RawFunction) {
        self.functions
            .write()
            .await
            .insert(name.to_string(), function);
    }

    /// Number of rows currently stored in `table`
    pub async fn row_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .await
            .get(write_relation(table))
            .map(|rows| rows.len())
            .unwrap_or(0)
    }

    async fn rows_matching(
        &self,
        table: &str,
        filters: &Map<String, Value>,
    ) -> Result<Vec<Value>, AppError> {
        validate_identifier(table)?;
        for column in filters.keys() {
            validate_identifier(column)?;
        }
        let tables = self.tables.read().await;
        Ok(tables
            .get(write_relation(table))
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_filters(row, filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl DatabaseProvider for MemoryDatabaseProvider {
    #[tracing::instrument(skip(self, filters), fields(db.table = %table, db.operation = "select"))]
    async fn query(&self, table: &str, filters: &Map<String, Value>) -> Result<Vec<Value>, AppError> {
        self.rows_matching(table, filters).await
    }

    #[tracing::instrument(skip(self, options), fields(db.table = %table, db.operation = "select", db.page = options.page))]
    async fn query_with_pagination(
        &self,
        table: &str,
        options: &QueryOptions,
    ) -> Result<PaginatedResult<Value>, AppError> {
        let mut rows = self.rows_matching(table, &options.filters).await?;

        if let Some(search) = &options.search {
            validate_identifier(&search.column)?;
            if !search.term.is_empty() {
                let needle = search.term.to_lowercase();
                rows.retain(|row| {
                    text_of(field(row, &search.column))
                        .to_lowercase()
                        .contains(&needle)
                });
            }
        }

        if let Some(order) = &options.order_by {
            validate_identifier(&order.column)?;
            rows.sort_by(|a, b| {
                let ordering = compare_values(field(a, &order.column), field(b, &order.column));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        let total = rows.len() as u64;
        let page = options.effective_page();
        let page_size = options.effective_page_size();
        let data = rows
            .into_iter()
            .skip(options.offset() as usize)
            .take(page_size as usize)
            .collect();

        Ok(PaginatedResult::new(data, total, page, page_size))
    }

    #[tracing::instrument(skip(self), fields(db.table = %table, db.operation = "select", db.record_id = %id))]
    async fn get_by_id(&self, table: &str, id: &str) -> Result<Option<Value>, AppError> {
        let mut filters = Map::new();
        filters.insert("id".to_string(), Value::String(id.to_string()));
        Ok(self.rows_matching(table, &filters).await?.into_iter().next())
    }

    #[tracing::instrument(skip(self, data), fields(db.table = %table, db.operation = "insert"))]
    async fn insert(&self, table: &str, data: Value) -> Result<Value, AppError> {
        validate_identifier(table)?;
        let mut row = row_object(&data)?.clone();

        row.entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        let timestamp = now();
        row.entry("created_at").or_insert_with(|| timestamp.clone());
        row.entry("updated_at").or_insert(timestamp);

        let row = Value::Object(row);
        let mut tables = self.tables.write().await;
        tables
            .entry(write_relation(table).to_string())
            .or_default()
            .push(row.clone());

        Ok(row)
    }

    #[tracing::instrument(skip(self, data), fields(db.table = %table, db.operation = "update", db.record_id = %id))]
    async fn update(&self, table: &str, id: &str, data: Value) -> Result<Value, AppError> {
        validate_identifier(table)?;
        let changes = row_object(&data)?.clone();

        let mut tables = self.tables.write().await;
        let row = tables
            .get_mut(write_relation(table))
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|row| text_of(field(row, "id")) == id)
            })
            .ok_or_else(|| not_found(table, id))?;

        if let Value::Object(existing) = row {
            let stamp_updated_at = !changes.contains_key("updated_at");
            existing.extend(changes);
            if stamp_updated_at {
                existing.insert("updated_at".to_string(), now());
            }
        }

        Ok(row.clone())
    }

    #[tracing::instrument(skip(self), fields(db.table = %table, db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, table: &str, id: &str) -> Result<(), AppError> {
        validate_identifier(table)?;
        let mut tables = self.tables.write().await;
        if let Some(rows) = tables.get_mut(write_relation(table)) {
            rows.retain(|row| text_of(field(row, "id")) != id);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, params), fields(db.function = %function, db.operation = "call"))]
    async fn raw(&self, function: &str, params: Value) -> Result<Value, AppError> {
        validate_identifier(function)?;
        let callable = self
            .functions
            .read()
            .await
            .get(function)
            .cloned()
            .ok_or_else(|| {
                AppError::database("raw query", format!("function {} does not exist", function))
            })?;
        callable(params)
    }

    #[tracing::instrument(skip(self, key), fields(db.table = %table, db.operation = "upsert", db.column = %column))]
    async fn increment(
        &self,
        table: &str,
        key: &Map<String, Value>,
        column: &str,
        amount: i64,
    ) -> Result<Value, AppError> {
        validate_identifier(table)?;
        validate_identifier(column)?;
        if key.is_empty() {
            return Err(AppError::InvalidInput(
                "Increment requires at least one key column".to_string(),
            ));
        }
        for k in key.keys() {
            validate_identifier(k)?;
        }

        let mut tables = self.tables.write().await;
        let rows = tables.entry(write_relation(table).to_string()).or_default();

        if let Some(Value::Object(existing)) = rows.iter_mut().find(|row| matches_filters(row, key)) {
            let current = existing.get(column).and_then(Value::as_i64).unwrap_or(0);
            existing.insert(column.to_string(), Value::from(current + amount));
            existing.insert("updated_at".to_string(), now());
            return Ok(Value::Object(existing.clone()));
        }

        let mut row = key.clone();
        row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        row.insert(column.to_string(), Value::from(amount));
        let timestamp = now();
        row.insert("created_at".to_string(), timestamp.clone());
        row.insert("updated_at".to_string(), timestamp);
        let row = Value::Object(row);
        rows.push(row.clone());
        Ok(row)
    }
}
