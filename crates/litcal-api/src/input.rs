//! Lenient request-body field types.
//!
//! The admin form posts every field as a string, while scripted clients send
//! JSON numbers. Both are accepted for integer fields; a blank string means
//! the field was left empty.

use serde::{Deserialize, Deserializer};

use crate::error::ApiError;

/// An integer given either as a JSON number or as a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IntInput {
  Number(i64),
  Text(String),
}

impl IntInput {
  /// `Ok(None)` for a blank string.
  pub fn parse(self, field: &str) -> Result<Option<i64>, ApiError> {
    match self {
      Self::Number(n) => Ok(Some(n)),
      Self::Text(s) => {
        let s = s.trim();
        if s.is_empty() {
          return Ok(None);
        }
        s.parse()
          .map(Some)
          .map_err(|_| ApiError::Validation(format!("{field} must be an integer, got {s:?}")))
      }
    }
  }
}

/// A field that must be present and non-blank.
pub fn required_int(field: &str, value: Option<IntInput>) -> Result<i64, ApiError> {
  value
    .map(|v| v.parse(field))
    .transpose()?
    .flatten()
    .ok_or_else(|| ApiError::Validation(format!("{field} is required")))
}

/// A field that may be absent or blank.
pub fn optional_int(field: &str, value: Option<IntInput>) -> Result<Option<i64>, ApiError> {
  Ok(value.map(|v| v.parse(field)).transpose()?.flatten())
}

/// Narrow an integer to a smaller type, reporting overflow as invalid input.
pub fn narrow<T: TryFrom<i64>>(field: &str, value: i64) -> Result<T, ApiError> {
  T::try_from(value)
    .map_err(|_| ApiError::Validation(format!("{field} is out of range: {value}")))
}

/// Distinguish an absent field (`None`) from an explicit `null`
/// (`Some(None)`). Use with `#[serde(default, deserialize_with = ...)]`.
pub fn double_option<'de, D, T>(d: D) -> Result<Option<Option<T>>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  Option::<T>::deserialize(d).map(Some)
}
