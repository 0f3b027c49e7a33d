//! Data models for the application
//!
//! This module contains all data structures used throughout the application,
//! organized by domain. Stored entities use their column names as JSON field
//! names so rows returned by the database provider deserialize directly.

mod notification;
mod pagination;
mod payment;
mod subscription;
mod support;
mod user;

// Re-export all models for convenient imports
pub use notification::*;
pub use pagination::*;
pub use payment::*;
pub use subscription::*;
pub use support::*;
pub use user::*;
