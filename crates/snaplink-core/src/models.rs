//! Data models for SnapLink
//!
//! Defines the core data structures: [`Link`], its persisted record shape
//! [`LinkRecord`], and the read-only session identity [`UserIdentity`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{Document, Fields};
use crate::error::StoreError;

/// Field names used in persisted link records
pub mod fields {
    pub const USER_ID: &str = "userId";
    pub const LINK: &str = "link";
    pub const IS_PUBLIC: &str = "isPublic";
    pub const DATE_ADDED: &str = "dateAdded";
}

/// A shareable URL owned by one user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Link {
    /// Store-assigned identifier, never reused
    pub id: String,
    /// Identity of the creating user
    pub owner_id: String,
    /// Absolute http(s) URL
    pub url: String,
    /// Whether visitors of the share page may see this link
    pub is_public: bool,
    /// When this link was created
    pub created_at: DateTime<Utc>,
}

impl Link {
    /// Decode a link from a stored document
    pub fn from_document(doc: &Document) -> Result<Self, StoreError> {
        let record: LinkRecord = serde_json::from_value(Value::Object(doc.fields.clone()))
            .map_err(|e| StoreError::Corrupt {
                id: doc.id.clone(),
                details: e.to_string(),
            })?;

        Ok(Self {
            id: doc.id.clone(),
            owner_id: record.user_id,
            url: record.link,
            is_public: record.is_public,
            created_at: record.date_added,
        })
    }
}

/// The persisted shape of a link: `{ userId, link, isPublic, dateAdded }`
///
/// The record id lives on the document, not in the fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinkRecord {
    pub user_id: String,
    pub link: String,
    #[serde(default)]
    pub is_public: bool,
    pub date_added: DateTime<Utc>,
}

impl LinkRecord {
    /// A new private record created now
    pub fn new(owner_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            user_id: owner_id.into(),
            link: url.into(),
            is_public: false,
            date_added: Utc::now(),
        }
    }

    /// Convert to document fields
    pub fn into_fields(self) -> Fields {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // A struct of strings, a bool and a timestamp always serializes to an object
            _ => Fields::new(),
        }
    }
}

/// The signed-in user as reported by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserIdentity {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: String,
    pub photo_url: Option<String>,
}

impl UserIdentity {
    /// Display name, falling back to "User" when none was set
    pub fn display_name_or_default(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("User")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, fields: Value) -> Document {
        Document {
            id: id.to_string(),
            fields: fields.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn test_record_new_is_private() {
        let record = LinkRecord::new("u1", "https://example.com");
        assert_eq!(record.user_id, "u1");
        assert_eq!(record.link, "https://example.com");
        assert!(!record.is_public);
    }

    #[test]
    fn test_record_field_names() {
        let fields = LinkRecord::new("u1", "https://example.com").into_fields();
        assert_eq!(fields[fields::USER_ID], json!("u1"));
        assert_eq!(fields[fields::LINK], json!("https://example.com"));
        assert_eq!(fields[fields::IS_PUBLIC], json!(false));
        assert!(fields[fields::DATE_ADDED].is_string());
        assert_eq!(fields.len(), 4);
    }

    #[test]
    fn test_link_from_document() {
        let record = LinkRecord::new("u1", "https://example.com");
        let created = record.date_added;
        let link = Link::from_document(&Document {
            id: "abc".to_string(),
            fields: record.into_fields(),
        })
        .unwrap();

        assert_eq!(link.id, "abc");
        assert_eq!(link.owner_id, "u1");
        assert_eq!(link.url, "https://example.com");
        assert!(!link.is_public);
        assert_eq!(link.created_at, created);
    }

    #[test]
    fn test_missing_visibility_defaults_to_private() {
        let link = Link::from_document(&doc(
            "abc",
            json!({
                "userId": "u1",
                "link": "https://example.com",
                "dateAdded": "2024-05-01T10:00:00Z"
            }),
        ))
        .unwrap();
        assert!(!link.is_public);
    }

    #[test]
    fn test_corrupt_document() {
        let err = Link::from_document(&doc("bad", json!({ "userId": 7 }))).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { ref id, .. } if id == "bad"));
    }

    #[test]
    fn test_display_name_default() {
        let mut user = UserIdentity {
            uid: "u1".to_string(),
            display_name: None,
            email: "a@example.com".to_string(),
            photo_url: None,
        };
        assert_eq!(user.display_name_or_default(), "User");

        user.display_name = Some("  ".to_string());
        assert_eq!(user.display_name_or_default(), "User");

        user.display_name = Some("Ada".to_string());
        assert_eq!(user.display_name_or_default(), "Ada");
    }
}
