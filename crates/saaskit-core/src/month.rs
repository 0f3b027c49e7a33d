//! Month keys for monthly usage counters.
//!
//! Consumption rows are keyed by the first day of the month (`YYYY-MM-01`), so
//! counters reset implicitly when the month changes.

use chrono::{Datelike, NaiveDate, Utc};

/// Return the month key for `month`, or for the current UTC month when `None`.
///
/// Accepts `YYYY-MM`, `YYYY-MM-DD` or an RFC 3339 timestamp and normalizes to the
/// first of that month. Unparseable input is returned unchanged so callers that
/// already store a custom key keep working.
pub fn month_key(month: Option<&str>) -> String {
    match month {
        None => current_month_key(),
        Some(value) => normalize(value).unwrap_or_else(|| value.to_string()),
    }
}

/// First day of the current UTC month as `YYYY-MM-01`
pub fn current_month_key() -> String {
    let today = Utc::now().date_naive();
    format!("{:04}-{:02}-01", today.year(), today.month())
}

fn normalize(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let date = if trimmed.len() == 7 {
        NaiveDate::parse_from_str(&format!("{}-01", trimmed), "%Y-%m-%d").ok()?
    } else if trimmed.len() >= 10 {
        NaiveDate::parse_from_str(trimmed.get(..10)?, "%Y-%m-%d").ok()?
    } else {
        return None;
    };
    Some(format!("{:04}-{:02}-01", date.year(), date.month()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_month_key_is_first_of_month() {
        let key = month_key(None);
        assert_eq!(key.len(), 10);
        assert!(key.ends_with("-01"));
        assert_eq!(key, current_month_key());
    }

    #[test]
    fn test_month_key_normalizes_dates() {
        assert_eq!(month_key(Some("2024-03")), "2024-03-01");
        assert_eq!(month_key(Some("2024-03-17")), "2024-03-01");
        assert_eq!(month_key(Some("2024-12-31T23:59:59Z")), "2024-12-01");
    }

    #[test]
    fn test_month_key_keeps_unparseable_input() {
        assert_eq!(month_key(Some("bogus")), "bogus");
    }
}
