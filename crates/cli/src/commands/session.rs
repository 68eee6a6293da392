//! Sign-in, identity and sign-out.

use medibook_client::Medibook;
use medibook_client::auth::{AuthStatus, SessionToken};
use url::Url;

use crate::output;

/// Print the provider sign-in link.
pub fn login(app: &Medibook) {
    app.auth().sign_in_with_google();
}

/// Complete sign-in from the callback URL or a pasted token.
///
/// # Errors
///
/// Returns an error if neither yields a valid session.
pub async fn callback(
    app: &Medibook,
    url: Option<&Url>,
    token: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let status = match (url, token.and_then(SessionToken::new)) {
        (Some(url), _) => app.initialize(Some(url)).await,
        (None, Some(token)) => {
            app.auth().fetch_profile(token).await;
            app.cart().refresh().await;
            app.auth().status()
        }
        (None, None) => return Err("No session token supplied".into()),
    };

    if status != AuthStatus::Authenticated {
        return Err("Sign-in failed; the token was not accepted".into());
    }
    if let Some(identity) = app.auth().identity() {
        output::line(&format!("Signed in as {}", identity.email));
    }
    Ok(())
}

/// Show the signed-in user.
pub async fn whoami(app: &Medibook) {
    match app.initialize(None).await {
        AuthStatus::Authenticated => {
            if let Some(identity) = app.auth().identity() {
                output::line(&format!(
                    "{} <{}> (id {})",
                    identity.greeting_name(),
                    identity.email,
                    identity.id
                ));
            }
        }
        AuthStatus::Loading | AuthStatus::Anonymous => output::line("Not signed in."),
    }
}

/// Sign out, locally even if the server cannot be reached.
pub async fn logout(app: &Medibook) {
    app.initialize(None).await;
    app.sign_out().await;
    output::line("Signed out.");
}
