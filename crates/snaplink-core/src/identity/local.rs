//! Local identity provider
//!
//! Accounts live in the `accounts` table of the SnapLink database with
//! Argon2id password hashes. The signed-in account is persisted in the
//! single-row `session` table, so a new process starts signed in as
//! whoever signed in last.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use super::IdentityProvider;
use crate::config::Config;
use crate::error::{AuthError, Result, StoreError};
use crate::models::UserIdentity;
use crate::storage::schema;

/// Identity provider backed by the local SQLite database
pub struct LocalIdentityProvider {
    conn: Mutex<Connection>,
    current: watch::Sender<Option<UserIdentity>>,
}

impl LocalIdentityProvider {
    /// Open the accounts stored in the configured database
    pub fn open(config: &Config) -> std::result::Result<Self, StoreError> {
        Self::open_path(&config.sqlite_path())
    }

    pub fn open_path(path: &Path) -> std::result::Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::from_io(e, parent))?;
        }
        let conn = Connection::open(path)?;
        schema::prepare(&conn)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory account database (for testing)
    pub fn open_in_memory() -> std::result::Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::prepare(&conn)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> std::result::Result<Self, StoreError> {
        let restored = load_session(&conn)?;
        if let Some(user) = &restored {
            debug!(uid = %user.uid, "Restored session");
        }

        let (current, _) = watch::channel(restored);
        Ok(Self {
            conn: Mutex::new(conn),
            current,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, user: Option<UserIdentity>) {
        self.current.send_replace(user);
    }
}

const IDENTITY_COLUMNS: &str = "a.uid, a.display_name, a.email, a.photo_url";

fn identity_from_row(row: &Row<'_>) -> rusqlite::Result<UserIdentity> {
    Ok(UserIdentity {
        uid: row.get(0)?,
        display_name: row.get(1)?,
        email: row.get(2)?,
        photo_url: row.get(3)?,
    })
}

fn load_session(conn: &Connection) -> rusqlite::Result<Option<UserIdentity>> {
    conn.query_row(
        &format!(
            "SELECT {IDENTITY_COLUMNS} FROM session s JOIN accounts a ON a.uid = s.uid WHERE s.slot = 0"
        ),
        [],
        identity_from_row,
    )
    .optional()
}

fn load_account(conn: &Connection, uid: &str) -> rusqlite::Result<Option<UserIdentity>> {
    conn.query_row(
        &format!("SELECT {IDENTITY_COLUMNS} FROM accounts a WHERE a.uid = ?1"),
        [uid],
        identity_from_row,
    )
    .optional()
}

fn save_session(conn: &Connection, uid: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO session (slot, uid) VALUES (0, ?1)",
        [uid],
    )?;
    Ok(())
}

/// Hash a password with Argon2id and a random salt
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Provider(format!("Password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Check a password against a stored hash
///
/// Returns `Ok(false)` on a mismatch; only a malformed hash is an error.
fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AuthError::Provider(format!("Invalid password hash format: {e}")))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Provider(format!("Password verification failed: {e}")).into()),
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<UserIdentity> {
        let email = email.trim();
        let display_name = display_name.trim();

        let user = {
            let conn = self.lock();
            let taken = conn
                .query_row("SELECT 1 FROM accounts WHERE email = ?1", [email], |_| Ok(()))
                .optional()?
                .is_some();
            if taken {
                return Err(AuthError::EmailInUse(email.to_string()).into());
            }

            let user = UserIdentity {
                uid: Uuid::new_v4().to_string(),
                display_name: (!display_name.is_empty()).then(|| display_name.to_string()),
                email: email.to_string(),
                photo_url: None,
            };

            conn.execute(
                "INSERT INTO accounts (uid, email, display_name, photo_url, password_hash, created_at)
                 VALUES (?1, ?2, ?3, NULL, ?4, ?5)",
                params![
                    user.uid,
                    user.email,
                    user.display_name,
                    hash_password(password)?,
                    Utc::now().timestamp()
                ],
            )?;
            save_session(&conn, &user.uid)?;
            user
        };

        info!(uid = %user.uid, "Account created");
        self.publish(Some(user.clone()));
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserIdentity> {
        let user = {
            let conn = self.lock();
            let account: Option<(String, String)> = conn
                .query_row(
                    "SELECT uid, password_hash FROM accounts WHERE email = ?1",
                    [email.trim()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((uid, hash)) = account else {
                return Err(AuthError::InvalidCredentials.into());
            };
            if !verify_password(password, &hash)? {
                return Err(AuthError::InvalidCredentials.into());
            }

            save_session(&conn, &uid)?;
            load_account(&conn, &uid)?.ok_or(AuthError::InvalidCredentials)?
        };

        info!(uid = %user.uid, "Signed in");
        self.publish(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<()> {
        self.lock().execute("DELETE FROM session", [])?;
        if self.current.borrow().is_some() {
            info!("Signed out");
        }
        self.publish(None);
        Ok(())
    }

    async fn update_photo_url(&self, url: &str) -> Result<UserIdentity> {
        let uid = self
            .current
            .borrow()
            .as_ref()
            .map(|user| user.uid.clone())
            .ok_or(AuthError::NotSignedIn)?;

        let user = {
            let conn = self.lock();
            let updated = conn.execute(
                "UPDATE accounts SET photo_url = ?2 WHERE uid = ?1",
                params![uid, url],
            )?;
            if updated == 0 {
                return Err(StoreError::MissingRecord {
                    collection: "accounts".to_string(),
                    id: uid,
                }
                .into());
            }
            load_account(&conn, &uid)?.ok_or(AuthError::NotSignedIn)?
        };

        debug!(uid = %user.uid, "Updated photo URL");
        self.publish(Some(user.clone()));
        Ok(user)
    }

    fn on_identity_change(&self) -> watch::Receiver<Option<UserIdentity>> {
        self.current.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SnapLinkError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sign_up_signs_in() {
        let provider = LocalIdentityProvider::open_in_memory().unwrap();
        let mut changes = provider.on_identity_change();
        assert!(changes.borrow().is_none());

        let user = provider
            .sign_up(" ada@example.com ", "hunter22", "Ada")
            .await
            .unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.display_name.as_deref(), Some("Ada"));
        assert!(user.photo_url.is_none());

        changes.changed().await.unwrap();
        assert_eq!(changes.borrow().as_ref(), Some(&user));
    }

    #[tokio::test]
    async fn test_email_in_use_ignores_case() {
        let provider = LocalIdentityProvider::open_in_memory().unwrap();
        provider
            .sign_up("ada@example.com", "hunter22", "Ada")
            .await
            .unwrap();

        let err = provider
            .sign_up("ADA@example.com", "other-pass", "Imposter")
            .await
            .unwrap_err();
        assert!(matches!(err, SnapLinkError::Auth(AuthError::EmailInUse(_))));
    }

    #[tokio::test]
    async fn test_sign_in_checks_password() {
        let provider = LocalIdentityProvider::open_in_memory().unwrap();
        let created = provider
            .sign_up("ada@example.com", "hunter22", "Ada")
            .await
            .unwrap();
        provider.sign_out().await.unwrap();
        assert!(provider.on_identity_change().borrow().is_none());

        let err = provider
            .sign_in("ada@example.com", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err, SnapLinkError::Auth(AuthError::InvalidCredentials));

        let user = provider.sign_in("ada@example.com", "hunter22").await.unwrap();
        assert_eq!(user, created);
    }

    #[tokio::test]
    async fn test_unknown_email_is_invalid_credentials() {
        let provider = LocalIdentityProvider::open_in_memory().unwrap();
        let err = provider
            .sign_in("nobody@example.com", "whatever")
            .await
            .unwrap_err();
        assert_eq!(err, SnapLinkError::Auth(AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_update_photo_requires_session() {
        let provider = LocalIdentityProvider::open_in_memory().unwrap();
        let err = provider
            .update_photo_url("file:///tmp/me.png")
            .await
            .unwrap_err();
        assert_eq!(err, SnapLinkError::Auth(AuthError::NotSignedIn));
    }

    #[tokio::test]
    async fn test_session_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snaplink.db");

        let uid = {
            let provider = LocalIdentityProvider::open_path(&path).unwrap();
            let user = provider
                .sign_up("ada@example.com", "hunter22", "")
                .await
                .unwrap();
            assert!(user.display_name.is_none());
            provider
                .update_photo_url("file:///tmp/ada.png")
                .await
                .unwrap();
            user.uid
        };

        let provider = LocalIdentityProvider::open_path(&path).unwrap();
        let restored = provider.on_identity_change().borrow().clone().unwrap();
        assert_eq!(restored.uid, uid);
        assert_eq!(restored.photo_url.as_deref(), Some("file:///tmp/ada.png"));

        provider.sign_out().await.unwrap();
        let provider = LocalIdentityProvider::open_path(&path).unwrap();
        assert!(provider.on_identity_change().borrow().is_none());
    }
}
