//! References — links from an event to authors, books, tags, articles and
//! other resources of the external catalogue.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  event::{normalize_optional, require_text},
};

/// Sentinel `reference_uuid` asking the store to generate an identifier.
pub const AUTO_UUID: &str = "auto";

/// A reference attached to exactly one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
  pub id:             i64,
  pub event_id:       i64,
  /// Kind of the referenced resource, e.g. `author`, `book`, `tag`.
  pub reference_type: String,
  pub reference_name: String,
  /// Identifier of the resource in the external catalogue.
  pub reference_uuid: Option<String>,
  pub reference_slug: Option<String>,
  /// Display priority; lower comes first.
  pub priority:       i64,
  /// Free-form extra data such as a cover image or an annotation.
  pub metadata:       Option<serde_json::Value>,
}

// ─── NewReference ────────────────────────────────────────────────────────────

/// Input to [`crate::store::CalendarStore::create_reference`].
#[derive(Debug, Clone)]
pub struct NewReference {
  pub event_id:       i64,
  pub reference_type: String,
  pub reference_name: String,
  /// `None`, blank or [`AUTO_UUID`] all mean "generate one".
  pub reference_uuid: Option<String>,
  /// Defaults to the lowercased uuid when absent.
  pub reference_slug: Option<String>,
  pub priority:       i64,
  pub metadata:       Option<serde_json::Value>,
}

impl NewReference {
  pub fn new(
    event_id: i64,
    reference_type: impl Into<String>,
    reference_name: impl Into<String>,
  ) -> Self {
    Self {
      event_id,
      reference_type: reference_type.into(),
      reference_name: reference_name.into(),
      reference_uuid: None,
      reference_slug: None,
      priority: 0,
      metadata: None,
    }
  }

  pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
    self.reference_uuid = Some(uuid.into());
    self
  }

  pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
    self.reference_slug = Some(slug.into());
    self
  }

  /// Validate required fields and resolve the uuid and slug defaults.
  ///
  /// After this call `reference_uuid` is always `Some`.
  pub fn validate(mut self) -> Result<Self> {
    self.reference_type = require_text("reference_type", self.reference_type)?;
    self.reference_name = require_text("reference_name", self.reference_name)?;
    self.metadata = self.metadata.take().filter(|m| !m.is_null());
    require_object(self.metadata.as_ref())?;
    let uuid = resolve_uuid(self.reference_uuid.take());
    self.reference_slug = resolve_slug(self.reference_slug.take(), Some(&uuid));
    self.reference_uuid = Some(uuid);
    Ok(self)
  }
}

// ─── ReferencePatch ──────────────────────────────────────────────────────────

/// Input to [`crate::store::CalendarStore::update_reference`]. `None` leaves
/// a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ReferencePatch {
  pub reference_type: Option<String>,
  pub reference_name: Option<String>,
  /// A blank value clears the uuid; [`AUTO_UUID`] generates a new one.
  pub reference_uuid: Option<String>,
  /// A blank value re-derives the slug from the uuid.
  pub reference_slug: Option<String>,
  pub priority:       Option<i64>,
  /// `Some(Value::Null)` clears the metadata.
  pub metadata:       Option<serde_json::Value>,
}

impl ReferencePatch {
  pub fn validate(mut self) -> Result<Self> {
    if let Some(t) = self.reference_type.take() {
      self.reference_type = Some(require_text("reference_type", t)?);
    }
    if let Some(n) = self.reference_name.take() {
      self.reference_name = Some(require_text("reference_name", n)?);
    }
    require_object(self.metadata.as_ref().filter(|m| !m.is_null()))?;
    Ok(self)
  }

  /// Produce the updated reference. `current` is left untouched.
  pub fn apply(self, current: &Reference) -> Reference {
    let mut next = current.clone();
    if let Some(t) = self.reference_type {
      next.reference_type = t;
    }
    if let Some(n) = self.reference_name {
      next.reference_name = n;
    }
    if let Some(u) = self.reference_uuid {
      next.reference_uuid = match u.trim() {
        "" => None,
        AUTO_UUID => Some(Uuid::new_v4().to_string()),
        other => Some(other.to_owned()),
      };
    }
    if let Some(s) = self.reference_slug {
      next.reference_slug = resolve_slug(Some(s), next.reference_uuid.as_deref());
    }
    if let Some(p) = self.priority {
      next.priority = p;
    }
    if let Some(m) = self.metadata {
      next.metadata = (!m.is_null()).then_some(m);
    }
    next
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Return the caller's uuid, or a fresh v4 uuid when it is absent, blank or
/// the [`AUTO_UUID`] sentinel.
pub fn resolve_uuid(requested: Option<String>) -> String {
  match normalize_optional(requested) {
    Some(u) if u != AUTO_UUID => u,
    _ => Uuid::new_v4().to_string(),
  }
}

/// Metadata, when present, is a JSON object.
fn require_object(metadata: Option<&serde_json::Value>) -> Result<()> {
  match metadata {
    Some(m) if !m.is_object() => {
      Err(Error::validation("metadata must be a JSON object"))
    }
    _ => Ok(()),
  }
}

fn resolve_slug(requested: Option<String>, uuid: Option<&str>) -> Option<String> {
  normalize_optional(requested).or_else(|| uuid.map(str::to_lowercase))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn auto_uuid_is_generated() {
    let r = NewReference::new(1, "article", "Wiki")
      .with_uuid(AUTO_UUID)
      .validate()
      .unwrap();
    let uuid = r.reference_uuid.unwrap();
    assert_ne!(uuid, AUTO_UUID);
    assert!(Uuid::parse_str(&uuid).is_ok());
  }

  #[test]
  fn explicit_uuid_is_kept_and_slug_derived() {
    let r = NewReference::new(1, "book", "Onegin")
      .with_uuid("ABC-123")
      .validate()
      .unwrap();
    assert_eq!(r.reference_uuid.as_deref(), Some("ABC-123"));
    assert_eq!(r.reference_slug.as_deref(), Some("abc-123"));
  }

  #[test]
  fn blank_name_is_rejected() {
    assert!(NewReference::new(1, "book", " ").validate().is_err());
  }

  #[test]
  fn metadata_must_be_an_object() {
    let mut r = NewReference::new(1, "book", "Onegin");
    r.metadata = Some(serde_json::json!(["cover.jpg"]));
    assert!(matches!(r.validate(), Err(Error::Validation(m)) if m.contains("metadata")));

    let patch = ReferencePatch {
      metadata: Some(serde_json::json!("cover.jpg")),
      ..Default::default()
    };
    assert!(patch.validate().is_err());

    let clear = ReferencePatch {
      metadata: Some(serde_json::Value::Null),
      ..Default::default()
    };
    assert!(clear.validate().is_ok());
  }

  #[test]
  fn patch_blank_uuid_clears_it() {
    let current = Reference {
      id:             1,
      event_id:       1,
      reference_type: "book".into(),
      reference_name: "Onegin".into(),
      reference_uuid: Some("u-1".into()),
      reference_slug: Some("onegin".into()),
      priority:       0,
      metadata:       None,
    };
    let patch = ReferencePatch {
      reference_uuid: Some(String::new()),
      ..Default::default()
    };
    let next = patch.apply(&current);
    assert_eq!(next.reference_uuid, None);
    assert_eq!(next.reference_slug.as_deref(), Some("onegin"));
  }
}
