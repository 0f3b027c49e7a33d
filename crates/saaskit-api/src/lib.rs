//! SaaSKit API Library
//!
//! HTTP handlers, extractors, middleware and application setup for the
//! SaaSKit backend. `main` only loads configuration and calls into [`setup`].

mod api_doc;
mod handlers;
mod middleware;
mod telemetry;

pub mod auth;
pub mod error;
pub mod setup;
pub mod state;

pub use api_doc::ApiDoc;
pub use error::ErrorResponse;
pub use middleware::RequestId;
pub use setup::routes::setup_routes;
pub use state::AppState;
