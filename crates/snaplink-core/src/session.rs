//! The signed-in session
//!
//! A [`Session`] is created once per process and cloned into every
//! component that needs the current user. It mirrors the identity
//! provider's watch channel, so `current()` is always the latest state.

use tokio::sync::watch;
use tracing::debug;

use crate::error::{AuthError, Result};
use crate::identity::IdentityProviderRef;
use crate::models::UserIdentity;
use crate::validation::{validate_sign_in, validate_sign_up, SignInForm, SignUpForm};

/// Shared view of who is signed in
#[derive(Clone)]
pub struct Session {
    provider: IdentityProviderRef,
    identity: watch::Receiver<Option<UserIdentity>>,
}

impl Session {
    pub fn new(provider: IdentityProviderRef) -> Self {
        let identity = provider.on_identity_change();
        Self { provider, identity }
    }

    /// The signed-in user, if any
    pub fn current(&self) -> Option<UserIdentity> {
        self.identity.borrow().clone()
    }

    /// The signed-in user, or [`AuthError::NotSignedIn`]
    pub fn require(&self) -> Result<UserIdentity> {
        self.current().ok_or_else(|| AuthError::NotSignedIn.into())
    }

    /// Watch identity transitions
    pub fn on_change(&self) -> watch::Receiver<Option<UserIdentity>> {
        self.identity.clone()
    }

    pub fn provider(&self) -> &IdentityProviderRef {
        &self.provider
    }

    /// Validate the sign-in form, then sign in
    ///
    /// A form that fails validation reports its first failing field and
    /// never reaches the provider.
    pub async fn sign_in(&self, form: &SignInForm) -> Result<UserIdentity> {
        if let Some(error) = validate_sign_in(form).into_iter().next() {
            debug!(%error, "Sign-in form rejected");
            return Err(error.into());
        }
        self.provider.sign_in(&form.email, &form.password).await
    }

    /// Validate the sign-up form, then register
    pub async fn sign_up(&self, form: &SignUpForm) -> Result<UserIdentity> {
        if let Some(error) = validate_sign_up(form).into_iter().next() {
            debug!(%error, "Sign-up form rejected");
            return Err(error.into());
        }
        self.provider
            .sign_up(&form.email, &form.password, &form.name)
            .await
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.provider.sign_out().await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("current", &self.current().map(|user| user.uid))
            .finish()
    }
}
