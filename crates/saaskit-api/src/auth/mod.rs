//! Request authentication.
//!
//! Tokens are issued by the auth provider; the API keeps no session state and
//! resolves the caller on every request.

mod extractor;

pub use extractor::{bearer_token, AdminUser, CurrentUser};
