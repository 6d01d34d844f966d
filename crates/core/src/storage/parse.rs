//! Database value parsing utilities
//!
//! Stored text columns are parsed into typed values; failures surface as
//! rusqlite conversion errors rather than panics.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Error as SqlError;
use uuid::Uuid;

use crate::models::MealType;

fn conversion_error(
    column: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> SqlError {
    SqlError::FromSqlConversionFailure(column, Type::Text, Box::new(e))
}

/// Parse a UUID from a database string column
pub fn parse_uuid(column: usize, s: &str) -> Result<Uuid, SqlError> {
    Uuid::parse_str(s).map_err(|e| conversion_error(column, e))
}

/// Parse a DateTime from an RFC3339 string
pub fn parse_datetime(column: usize, s: &str) -> Result<DateTime<Utc>, SqlError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}

/// Parse a meal tag (`all`, `lunch`, `dinner`)
pub fn parse_meal(column: usize, s: &str) -> Result<MealType, SqlError> {
    s.parse().map_err(|e| conversion_error(column, e))
}

/// Fixed-width RFC3339 so text ordering matches time ordering
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Extension trait for converting rusqlite Results to Option
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, SqlError>;
}

impl<T> OptionalExt<T> for Result<T, SqlError> {
    fn optional(self) -> Result<Option<T>, SqlError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(SqlError::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_is_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let later = whole + chrono::Duration::milliseconds(250);
        assert_eq!(format_datetime(&whole).len(), format_datetime(&later).len());
        assert!(format_datetime(&whole) < format_datetime(&later));
        assert_eq!(parse_datetime(0, &format_datetime(&later)).unwrap(), later);
    }

    #[test]
    fn test_bad_values_are_conversion_errors() {
        assert!(matches!(
            parse_uuid(2, "nope"),
            Err(SqlError::FromSqlConversionFailure(2, _, _))
        ));
        assert!(parse_meal(3, "brunch").is_err());
    }
}
