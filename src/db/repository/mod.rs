pub mod audit;
pub mod cdt;
pub mod confirmation;

pub use audit::*;
pub use cdt::*;
pub use confirmation::*;

use chrono::{DateTime, Utc};

use super::DatabaseError;

/// Parse an RFC 3339 timestamp column.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad timestamp {raw}: {e}")))
}
