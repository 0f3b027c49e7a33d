//! Postgres implementation of [`DatabaseProvider`].
//!
//! Row values are never interpolated into SQL. Each statement binds the row (or
//! the filters) as one `jsonb` parameter and expands it with
//! `jsonb_populate_record(NULL::<table>, $1)`, so Postgres casts every value to
//! the column's declared type. Results come back as `to_jsonb(t.*)`.

use super::identifier::{quote, read_relation, row_object, validate_identifier, write_relation};
use super::provider::DatabaseProvider;
use async_trait::async_trait;
use saaskit_core::models::{PaginatedResult, QueryOptions};
use saaskit_core::AppError;
use serde_json::{Map, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use std::time::Duration;

#[derive(Clone)]
pub struct PostgresDatabaseProvider {
    pool: PgPool,
}

/// `WHERE` fragment matching every filter column against the populated record `f`
fn filter_clause(filters: &Map<String, Value>) -> Result<String, AppError> {
    let mut conditions = Vec::with_capacity(filters.len());
    for column in filters.keys() {
        let col = quote(column)?;
        conditions.push(format!("t.{col} IS NOT DISTINCT FROM f.{col}"));
    }
    Ok(if conditions.is_empty() {
        "TRUE".to_string()
    } else {
        conditions.join(" AND ")
    })
}

/// Escape LIKE wildcards so the term matches literally
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

impl PostgresDatabaseProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`. Migrations are not run here.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout_secs: u64,
    ) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(database_url)
            .await
            .map_err(|e| AppError::database("connect", e))?;

        tracing::info!(max_connections, "Database connected successfully");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DatabaseProvider for PostgresDatabaseProvider {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database("ping", e))?;
        Ok(())
    }

    #[tracing::instrument(skip(self, filters), fields(db.table = %table, db.operation = "select"))]
    async fn query(&self, table: &str, filters: &Map<String, Value>) -> Result<Vec<Value>, AppError> {
        let relation = quote(read_relation(table))?;
        let sql = format!(
            "SELECT to_jsonb(t.*) FROM {relation} t, jsonb_populate_record(NULL::{relation}, $1) f WHERE {}",
            filter_clause(filters)?
        );

        sqlx::query_scalar::<Postgres, Value>(&sql)
            .bind(Json(Value::Object(filters.clone())))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database("query", e))
    }

    #[tracing::instrument(skip(self, options), fields(db.table = %table, db.operation = "select", db.page = options.page))]
    async fn query_with_pagination(
        &self,
        table: &str,
        options: &QueryOptions,
    ) -> Result<PaginatedResult<Value>, AppError> {
        let relation = quote(read_relation(table))?;
        let mut where_clause = filter_clause(&options.filters)?;

        let search_pattern = match &options.search {
            Some(search) if !search.term.is_empty() => {
                let col = quote(&search.column)?;
                where_clause.push_str(&format!(" AND t.{col}::text ILIKE $2"));
                Some(like_pattern(&search.term))
            }
            Some(search) => {
                validate_identifier(&search.column)?;
                None
            }
            None => None,
        };

        let order_clause = match &options.order_by {
            Some(order) => format!(
                " ORDER BY t.{} {}",
                quote(&order.column)?,
                if order.ascending { "ASC" } else { "DESC" }
            ),
            None => String::new(),
        };

        let from = format!("FROM {relation} t, jsonb_populate_record(NULL::{relation}, $1) f");
        let filters = Json(Value::Object(options.filters.clone()));
        let page = options.effective_page();
        let page_size = options.effective_page_size();

        // $2 is the search pattern when present; limit/offset follow it
        let (limit_idx, offset_idx) = if search_pattern.is_some() { (3, 4) } else { (2, 3) };

        let count_sql = format!("SELECT COUNT(*) {from} WHERE {where_clause}");
        let mut count_query = sqlx::query_scalar::<Postgres, i64>(&count_sql).bind(&filters);
        if let Some(pattern) = &search_pattern {
            count_query = count_query.bind(pattern);
        }
        let total = count_query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database("count", e))?;

        let data_sql = format!(
            "SELECT to_jsonb(t.*) {from} WHERE {where_clause}{order_clause} LIMIT ${limit_idx} OFFSET ${offset_idx}"
        );
        let mut data_query = sqlx::query_scalar::<Postgres, Value>(&data_sql).bind(&filters);
        if let Some(pattern) = &search_pattern {
            data_query = data_query.bind(pattern);
        }
        let data = data_query
            .bind(page_size as i64)
            .bind(options.offset() as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database("query", e))?;

        Ok(PaginatedResult::new(data, total.max(0) as u64, page, page_size))
    }

    #[tracing::instrument(skip(self), fields(db.table = %table, db.operation = "select", db.record_id = %id))]
    async fn get_by_id(&self, table: &str, id: &str) -> Result<Option<Value>, AppError> {
        let relation = quote(read_relation(table))?;
        let sql = format!("SELECT to_jsonb(t.*) FROM {relation} t WHERE t.id::text = $1");

        sqlx::query_scalar::<Postgres, Value>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database("getById", e))
    }

    #[tracing::instrument(skip(self, data), fields(db.table = %table, db.operation = "insert"))]
    async fn insert(&self, table: &str, data: Value) -> Result<Value, AppError> {
        let relation = quote(write_relation(table))?;
        let object = row_object(&data)?;

        let sql = if object.is_empty() {
            format!("INSERT INTO {relation} AS t DEFAULT VALUES RETURNING to_jsonb(t.*)")
        } else {
            let columns = object
                .keys()
                .map(|k| quote(k))
                .collect::<Result<Vec<_>, _>>()?
                .join(", ");
            format!(
                "INSERT INTO {relation} AS t ({columns}) \
                 SELECT {columns} FROM jsonb_populate_record(NULL::{relation}, $1) \
                 RETURNING to_jsonb(t.*)"
            )
        };

        let mut query = sqlx::query_scalar::<Postgres, Value>(&sql);
        if !object.is_empty() {
            query = query.bind(Json(&data));
        }
        query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database("insert", e))
    }

    #[tracing::instrument(skip(self, data), fields(db.table = %table, db.operation = "update", db.record_id = %id))]
    async fn update(&self, table: &str, id: &str, data: Value) -> Result<Value, AppError> {
        let relation = quote(write_relation(table))?;
        let object = row_object(&data)?;

        if object.is_empty() {
            return self
                .get_by_id(write_relation(table), id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Record {} not found in {}", id, table)));
        }

        let assignments = object
            .keys()
            .map(|k| quote(k).map(|col| format!("{col} = f.{col}")))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");
        let sql = format!(
            "UPDATE {relation} AS t SET {assignments} \
             FROM jsonb_populate_record(NULL::{relation}, $1) f \
             WHERE t.id::text = $2 RETURNING to_jsonb(t.*)"
        );

        sqlx::query_scalar::<Postgres, Value>(&sql)
            .bind(Json(&data))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database("update", e))?
            .ok_or_else(|| AppError::NotFound(format!("Record {} not found in {}", id, table)))
    }

    #[tracing::instrument(skip(self), fields(db.table = %table, db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, table: &str, id: &str) -> Result<(), AppError> {
        let relation = quote(write_relation(table))?;
        let sql = format!("DELETE FROM {relation} t WHERE t.id::text = $1");

        sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database("delete", e))?;

        Ok(())
    }

    #[tracing::instrument(skip(self, params), fields(db.function = %function, db.operation = "call"))]
    async fn raw(&self, function: &str, params: Value) -> Result<Value, AppError> {
        let function = quote(function)?;
        let sql = format!("SELECT to_jsonb({function}($1::jsonb))");

        let result = sqlx::query_scalar::<Postgres, Option<Value>>(&sql)
            .bind(Json(params))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database("raw query", e))?;

        Ok(result.unwrap_or(Value::Null))
    }

    #[tracing::instrument(skip(self, key), fields(db.table = %table, db.operation = "upsert", db.column = %column))]
    async fn increment(
        &self,
        table: &str,
        key: &Map<String, Value>,
        column: &str,
        amount: i64,
    ) -> Result<Value, AppError> {
        if key.is_empty() {
            return Err(AppError::InvalidInput(
                "Increment requires at least one key column".to_string(),
            ));
        }

        let relation = quote(write_relation(table))?;
        let target = quote(column)?;
        let key_columns = key
            .keys()
            .map(|k| quote(k))
            .collect::<Result<Vec<_>, _>>()?;
        let insert_columns = key_columns.join(", ");
        let select_columns = key_columns
            .iter()
            .map(|c| format!("f.{c}"))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "INSERT INTO {relation} AS t ({insert_columns}, {target}) \
             SELECT {select_columns}, $2 FROM jsonb_populate_record(NULL::{relation}, $1) f \
             ON CONFLICT ({insert_columns}) DO UPDATE SET {target} = t.{target} + EXCLUDED.{target} \
             RETURNING to_jsonb(t.*)"
        );

        sqlx::query_scalar::<Postgres, Value>(&sql)
            .bind(Json(Value::Object(key.clone())))
            .bind(amount)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database("increment", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_clause_quotes_columns() {
        let filters = json!({"user_id": "u1", "status": "active"});
        let clause = filter_clause(filters.as_object().unwrap()).unwrap();
        assert!(clause.contains("t.\"status\" IS NOT DISTINCT FROM f.\"status\""));
        assert!(clause.contains("t.\"user_id\" IS NOT DISTINCT FROM f.\"user_id\""));
        assert_eq!(clause.matches(" AND ").count(), 1);
    }

    #[test]
    fn test_filter_clause_empty_is_true() {
        assert_eq!(filter_clause(&Map::new()).unwrap(), "TRUE");
    }

    #[test]
    fn test_filter_clause_rejects_injection() {
        let filters = json!({"id = id OR 1": 1});
        assert!(filter_clause(filters.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
