//! SaaSKit Core Library
//!
//! This crate provides the domain models, error types and configuration shared by
//! the database layer, the business services and the HTTP API.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod month;

// Re-export commonly used types
pub use config::{Config, DatabaseBackend, PaymentBackend, PaymentSelection};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use month::month_key;
