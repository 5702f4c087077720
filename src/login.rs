use anyhow::{anyhow, bail, Context, Result};
use tracing::debug;

use crate::args::BaseArgs;
use crate::auth::{HttpAuthBackend, TokenStore};
use crate::config::Settings;
use crate::http::ApiClient;
use crate::remote::HttpFitnessApi;
use crate::session::{
    acquire_session, CredentialHints, Session, SessionOrigin, SessionOutcome, TerminalPrompter,
};
use crate::ui::{print_command_status, with_spinner, CommandStatus};

/// An authenticated API handle plus the session it came from.
pub struct LoginContext {
    pub session: Session,
    pub api: HttpFitnessApi,
}

pub async fn login(settings: &Settings) -> Result<LoginContext> {
    let backend = HttpAuthBackend::new(&settings.auth_url)
        .context("failed to build authentication client")?;
    let store = TokenStore::from_settings(settings);
    let hints = CredentialHints {
        email: settings.email.clone(),
        password: settings.password.clone(),
    };

    let outcome = acquire_session(&backend, &store, hints, &mut TerminalPrompter).await?;
    let session = match outcome {
        SessionOutcome::Ready(session) => session,
        SessionOutcome::NoSession(kind) => bail!("no session: {kind}"),
    };
    debug!(origin = ?session.origin, "session ready");

    let client = ApiClient::new(&settings.api_url, Some(session.bundle.access_token.clone()))
        .map_err(|err| anyhow!(err).context("failed to build API client"))?;
    debug!(api = client.base_url(), "API client ready");
    Ok(LoginContext {
        session,
        api: HttpFitnessApi::new(client),
    })
}

/// `fitsync login`: make sure a usable session exists and report who it belongs to.
pub async fn run(base: BaseArgs) -> Result<()> {
    let settings = Settings::resolve(&base)?;
    let ctx = login(&settings).await?;

    let display_name = with_spinner("Checking profile...", ctx.api.display_name())
        .await
        .unwrap_or_else(|err| {
            debug!(error = %err, "could not fetch profile");
            None
        });

    let how = match ctx.session.origin {
        SessionOrigin::Restored => "Restored stored session",
        SessionOrigin::Refreshed => "Refreshed stored session",
        SessionOrigin::LoggedIn => "Logged in",
    };

    if base.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "status": "ok",
                "origin": how,
                "display_name": display_name,
                "expires_at": ctx.session.bundle.expires_at,
            }))?
        );
        return Ok(());
    }

    match display_name {
        Some(name) => print_command_status(CommandStatus::Success, &format!("{how} as {name}")),
        None => print_command_status(CommandStatus::Success, how),
    }
    Ok(())
}
