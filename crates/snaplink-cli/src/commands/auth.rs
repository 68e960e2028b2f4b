//! Account and session command handlers

use anyhow::Result;

use snaplink_core::sharing::share_url;
use snaplink_core::validation::{SignInForm, SignUpForm};
use snaplink_core::AuthError;

use crate::app::{user_error, App};
use crate::output::Output;
use crate::prompt;

/// Create an account and sign in to it
pub async fn signup(
    app: &App,
    name: String,
    email: String,
    password: Option<String>,
    output: &Output,
) -> Result<()> {
    let prompted = password.is_none();
    let password = prompt::password(password, "Password")?;
    let confirm_password = if prompted {
        prompt::password(None, "Confirm password")?
    } else {
        password.clone()
    };

    let user = app
        .session
        .sign_up(&SignUpForm {
            name,
            email,
            password,
            confirm_password,
        })
        .await
        .map_err(user_error)?;

    output.success(&format!("Signed up as {}", user.email));
    Ok(())
}

/// Sign in to an existing account
pub async fn login(app: &App, email: String, password: Option<String>, output: &Output) -> Result<()> {
    let password = prompt::password(password, "Password")?;

    let user = app
        .session
        .sign_in(&SignInForm { email, password })
        .await
        .map_err(user_error)?;

    output.success(&format!("Signed in as {}", user.email));
    Ok(())
}

pub async fn logout(app: &App, output: &Output) -> Result<()> {
    if app.session.current().is_none() {
        output.message("Not signed in.");
        return Ok(());
    }

    app.session.sign_out().await.map_err(user_error)?;
    output.success("Signed out");
    Ok(())
}

/// Show the signed-in user
pub fn whoami(app: &App, output: &Output) -> Result<()> {
    let user = app.session.require().map_err(user_error)?;
    let summary = app
        .profile()
        .profile_summary()
        .ok_or_else(|| user_error(AuthError::NotSignedIn.into()))?;
    let share_url = share_url(&app.config.origin, &user.uid, &summary.display_name)
        .ok()
        .map(|url| url.to_string());

    output.print_profile(&user, &summary, share_url.as_deref());
    Ok(())
}
