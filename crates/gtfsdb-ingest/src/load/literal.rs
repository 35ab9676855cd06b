//! SQL literal encoding for bulk inserts
//!
//! Values are embedded in the statement as standard-conforming string
//! literals. PostgreSQL casts an untyped literal to the column type, so one
//! encoding serves text, numeric, date and enum columns alike.

use thiserror::Error;

/// Why a value cannot be embedded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LiteralError {
    #[error("value contains a NUL byte")]
    NulByte,
}

/// Encode an optional raw value: missing or empty becomes `NULL`, anything
/// else a quoted literal with `'` doubled.
pub fn encode(value: Option<&str>) -> Result<String, LiteralError> {
    match value {
        None | Some("") => Ok("NULL".to_string()),
        Some(v) if v.contains('\0') => Err(LiteralError::NulByte),
        Some(v) => Ok(format!("'{}'", v.replace('\'', "''"))),
    }
}
