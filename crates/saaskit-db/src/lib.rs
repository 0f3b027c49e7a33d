//! SaaSKit database layer
//!
//! A table-generic provider over JSON rows. Services talk to the
//! [`DatabaseProvider`] trait; Postgres (sqlx) and an in-memory store implement it.

pub mod db;

pub use db::{
    from_row, from_rows, to_row, DatabaseProvider, MemoryDatabaseProvider,
    PostgresDatabaseProvider, RawFunction,
};
