//! Identity provider interface
//!
//! Issues and tracks the signed-in user. The core never sees credentials
//! beyond passing them through; it only reads [`UserIdentity`] values
//! published on the identity watch channel.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::Result;
use crate::models::UserIdentity;

pub mod local;

pub use local::LocalIdentityProvider;

/// Session lifecycle for registered users
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register a new account and sign it in
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<UserIdentity>;

    /// Sign in with existing credentials
    ///
    /// Fails with [`AuthError::InvalidCredentials`](crate::error::AuthError::InvalidCredentials)
    /// for an unknown email or a wrong password.
    async fn sign_in(&self, email: &str, password: &str) -> Result<UserIdentity>;

    /// End the current session; a no-op when nobody is signed in
    async fn sign_out(&self) -> Result<()>;

    /// Set the signed-in user's photo URL
    async fn update_photo_url(&self, url: &str) -> Result<UserIdentity>;

    /// Watch the signed-in identity
    ///
    /// The initial value is the state at startup; every sign in, sign up,
    /// sign out and profile update publishes a new value.
    fn on_identity_change(&self) -> watch::Receiver<Option<UserIdentity>>;
}

/// Shared handle to an identity provider
pub type IdentityProviderRef = Arc<dyn IdentityProvider>;
