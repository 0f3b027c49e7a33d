//! Table and column name handling.
//!
//! Identifiers are interpolated into SQL, so every name is checked against
//! `[A-Za-z_][A-Za-z0-9_]*` and double-quoted before use.

use regex::Regex;
use saaskit_core::constants::tables;
use saaskit_core::AppError;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"));

/// Maximum identifier length accepted by Postgres
const MAX_IDENTIFIER_LEN: usize = 63;

pub fn validate_identifier(name: &str) -> Result<(), AppError> {
    if name.len() > MAX_IDENTIFIER_LEN || !IDENTIFIER.is_match(name) {
        return Err(AppError::InvalidInput(format!(
            "Invalid identifier: {:?}",
            name
        )));
    }
    Ok(())
}

/// Validate and double-quote an identifier
pub fn quote(name: &str) -> Result<String, AppError> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name))
}

/// Physical relation used when reading `table`.
/// `user_profiles` is served by the denormalized `user_profiles_view`.
pub fn read_relation(table: &str) -> &str {
    if table == tables::USER_PROFILES {
        tables::USER_PROFILES_VIEW
    } else {
        table
    }
}

/// Physical relation used when writing `table`.
/// Writes addressed to `user_profiles` land in the `profiles` table.
pub fn write_relation(table: &str) -> &str {
    if table == tables::USER_PROFILES || table == tables::USER_PROFILES_VIEW {
        tables::PROFILES
    } else {
        table
    }
}

/// Borrow the object behind a row value, validating every key
pub fn row_object<'a>(data: &'a Value) -> Result<&'a Map<String, Value>, AppError> {
    let object = data.as_object().ok_or_else(|| {
        AppError::InvalidInput("Row data must be a JSON object".to_string())
    })?;
    for key in object.keys() {
        validate_identifier(key)?;
    }
    Ok(object)
}
