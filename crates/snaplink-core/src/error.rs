//! Error taxonomy
//!
//! Every failure that reaches core logic is one of four kinds:
//!
//! - [`ValidationError`]: malformed input, resolved locally, shown inline
//! - [`AuthError`]: credential or session failures, shown as a blocking notification
//! - [`StoreError`]: persistence failures, shown as a blocking notification, never retried
//! - [`NotFoundError`]: missing blobs, never shown to the user
//!
//! Collaborator adapters convert their backend errors (SQLite, I/O, password
//! hashing) into this taxonomy at the boundary.

use std::io;
use std::path::Path;

use thiserror::Error;

/// Malformed or empty input. The operation is never attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Blank candidate
    #[error("Link cannot be empty")]
    Empty,

    /// Not parseable as an absolute URL
    #[error("Invalid link format: '{0}'")]
    Malformed(String),

    /// Parsed, but not http or https
    #[error("Unsupported scheme '{scheme}': only http and https links can be shared")]
    UnsupportedScheme { scheme: String },

    /// Parsed, but without a host to point at
    #[error("Link '{0}' has no host")]
    MissingHost(String),

    /// A form field failed its check
    #[error("{message}")]
    Field {
        field: &'static str,
        message: &'static str,
    },
}

/// Identity provider failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account already exists for '{0}'")]
    EmailInUse(String),

    #[error("Please log in to continue")]
    NotSignedIn,

    #[error("Identity provider error: {0}")]
    Provider(String),
}

/// Persistence-layer failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store cannot be reached (disconnected, busy, locked)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// An update targeted a record that does not exist
    #[error("Record '{id}' not found in '{collection}'")]
    MissingRecord { collection: String, id: String },

    /// A stored record could not be decoded
    #[error("Record '{id}' is corrupted: {details}")]
    Corrupt { id: String, details: String },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Classify an I/O error raised while touching `path`
    pub fn from_io(error: io::Error, path: &Path) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => {
                StoreError::PermissionDenied(format!("{}: {}", path.display(), error))
            }
            _ => StoreError::Backend(format!("{}: {}", path.display(), error)),
        }
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StoreError::Unavailable(_) => Some("Check your connection and try again."),
            StoreError::PermissionDenied(_) => {
                Some("You may not have access to this record. Sign in again and retry.")
            }
            StoreError::MissingRecord { .. } => {
                Some("The link may have been removed from another session.")
            }
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(error: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match &error {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    StoreError::Unavailable(error.to_string())
                }
                ErrorCode::PermissionDenied | ErrorCode::ReadOnly => {
                    StoreError::PermissionDenied(error.to_string())
                }
                _ => StoreError::Backend(error.to_string()),
            },
            _ => StoreError::Backend(error.to_string()),
        }
    }
}

/// A blob that does not exist
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Not found: '{path}'")]
pub struct NotFoundError {
    pub path: String,
}

/// The clipboard refused the write
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Could not copy to clipboard: {0}")]
pub struct ClipboardError(pub String);

/// Any error that crosses a collaborator boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapLinkError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),
}

impl From<rusqlite::Error> for SnapLinkError {
    fn from(error: rusqlite::Error) -> Self {
        SnapLinkError::Store(error.into())
    }
}

impl SnapLinkError {
    /// The blocking notification for this error, if it is user-visible
    ///
    /// Validation errors are rendered inline next to their entry and
    /// missing blobs degrade silently, so neither produces a notification.
    pub fn notification(&self) -> Option<Notification> {
        match self {
            SnapLinkError::Validation(_) | SnapLinkError::NotFound(_) => None,
            SnapLinkError::Auth(e) => Some(Notification::new(e.to_string())),
            SnapLinkError::Store(e) => Some(Notification {
                message: e.to_string(),
                suggestion: e.recovery_suggestion(),
            }),
        }
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, SnapLinkError>;

/// A blocking message surfaced to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub suggestion: Option<&'static str>,
}

impl Notification {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
        }
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.suggestion {
            Some(hint) => write!(f, "{} {}", self.message, hint),
            None => write!(f, "{}", self.message),
        }
    }
}
