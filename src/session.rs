//! Session acquisition.
//!
//! A session is either restored from the token store or derived from
//! credentials, never both in one call. The flow is an explicit state machine
//! over [`SessionStep`]; only MFA rate limiting and MFA transport failures are
//! fatal, everything else ends in a session or in "no session".

use std::fmt;

use tracing::{debug, warn};

use crate::auth::{
    restore_bundle, AuthBackend, Credentials, LoginResponse, TokenBundle, TokenStore,
};
use crate::http::ApiError;
use crate::ui::{self, print_command_status, CommandStatus, PromptError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    Restored,
    Refreshed,
    LoggedIn,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub bundle: TokenBundle,
    pub origin: SessionOrigin,
}

/// Why no session could be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Connection,
    Interrupted,
    NotInteractive,
    Unexpected,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::Connection => "could not reach the authentication service",
            FailureKind::Interrupted => "login interrupted",
            FailureKind::NotInteractive => "credentials required but no terminal to prompt on",
            FailureKind::Unexpected => "unexpected authentication failure",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("MFA rate limited by the service (HTTP 429); try again later")]
    MfaRateLimited,
    #[error("MFA verification failed")]
    MfaTransport(#[source] ApiError),
    #[error("failed to persist token bundle")]
    TokenStore(#[source] anyhow::Error),
}

#[derive(Debug)]
pub enum SessionOutcome {
    Ready(Session),
    NoSession(FailureKind),
}

#[derive(Debug)]
enum SessionStep {
    Restored(Session),
    LoggedIn(Session),
    NeedsLogin,
    NeedsMfa { challenge: String },
    Failed(FailureKind),
}

/// Source of interactive input during login.
pub trait Prompter {
    fn email(&mut self) -> Result<String, PromptError>;
    fn password(&mut self) -> Result<String, PromptError>;
    fn mfa_code(&mut self) -> Result<String, PromptError>;
}

pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn email(&mut self) -> Result<String, PromptError> {
        ui::prompt_text("Login email")
    }

    fn password(&mut self) -> Result<String, PromptError> {
        ui::prompt_secret("Password")
    }

    fn mfa_code(&mut self) -> Result<String, PromptError> {
        ui::prompt_text("MFA code")
    }
}

/// Credentials supplied up front; missing halves are prompted for.
#[derive(Debug, Clone, Default)]
pub struct CredentialHints {
    pub email: Option<String>,
    pub password: Option<String>,
}

fn prompt_failure(err: PromptError) -> FailureKind {
    match err {
        PromptError::Interrupted => FailureKind::Interrupted,
        PromptError::NotInteractive => FailureKind::NotInteractive,
        PromptError::Io(err) => {
            warn!(error = %err, "prompt failed");
            FailureKind::Unexpected
        }
    }
}

fn gather_credentials<P: Prompter>(
    hints: CredentialHints,
    prompter: &mut P,
) -> Result<Credentials, PromptError> {
    let email = match hints.email {
        Some(email) => email,
        None => prompter.email()?,
    };
    let password = match hints.password {
        Some(password) => password,
        None => prompter.password()?,
    };
    Ok(Credentials { email, password })
}

pub async fn acquire_session<A: AuthBackend, P: Prompter>(
    backend: &A,
    store: &TokenStore,
    hints: CredentialHints,
    prompter: &mut P,
) -> Result<SessionOutcome, SessionError> {
    let mut hints = Some(hints);
    let mut step = restore_step(backend, store).await;

    loop {
        step = match step {
            SessionStep::Restored(session) | SessionStep::LoggedIn(session) => {
                return Ok(SessionOutcome::Ready(session))
            }
            SessionStep::Failed(kind) => return Ok(SessionOutcome::NoSession(kind)),
            SessionStep::NeedsLogin => {
                // Supplied credentials are only tried once; after a rejection
                // everything is prompted for.
                let supplied = hints.take().unwrap_or_default();
                match gather_credentials(supplied, prompter) {
                    Ok(credentials) => login_step(backend, store, &credentials).await?,
                    Err(err) => SessionStep::Failed(prompt_failure(err)),
                }
            }
            SessionStep::NeedsMfa { challenge } => {
                mfa_step(backend, store, challenge, prompter).await?
            }
        };
    }
}

async fn restore_step<A: AuthBackend>(backend: &A, store: &TokenStore) -> SessionStep {
    match restore_bundle(backend, store).await {
        Ok(Some((bundle, refreshed))) => {
            debug!(refreshed, "restored session from token store");
            SessionStep::Restored(Session {
                bundle,
                origin: if refreshed {
                    SessionOrigin::Refreshed
                } else {
                    SessionOrigin::Restored
                },
            })
        }
        Ok(None) => {
            debug!(path = %store.bundle_path().display(), "no stored session");
            SessionStep::NeedsLogin
        }
        Err(err) => {
            debug!(error = ?err, "could not restore stored session");
            SessionStep::NeedsLogin
        }
    }
}

fn persist(store: &TokenStore, bundle: TokenBundle) -> Result<SessionStep, SessionError> {
    store.save(&bundle).map_err(SessionError::TokenStore)?;
    Ok(SessionStep::LoggedIn(Session {
        bundle,
        origin: SessionOrigin::LoggedIn,
    }))
}

async fn login_step<A: AuthBackend>(
    backend: &A,
    store: &TokenStore,
    credentials: &Credentials,
) -> Result<SessionStep, SessionError> {
    match backend.login(credentials).await {
        Ok(LoginResponse::Authenticated(bundle)) => persist(store, bundle),
        Ok(LoginResponse::MfaRequired { challenge }) => Ok(SessionStep::NeedsMfa { challenge }),
        Err(err) if err.is_auth_rejected() => {
            print_command_status(
                CommandStatus::Error,
                "Authentication failed; check your email and password",
            );
            Ok(SessionStep::NeedsLogin)
        }
        Err(err) if err.is_connection() => {
            print_command_status(CommandStatus::Error, &format!("Connection error: {err}"));
            Ok(SessionStep::Failed(FailureKind::Connection))
        }
        Err(err) => {
            warn!(error = %err, "login failed");
            Ok(SessionStep::Failed(FailureKind::Unexpected))
        }
    }
}

async fn mfa_step<A: AuthBackend, P: Prompter>(
    backend: &A,
    store: &TokenStore,
    challenge: String,
    prompter: &mut P,
) -> Result<SessionStep, SessionError> {
    let code = match prompter.mfa_code() {
        Ok(code) => code,
        Err(err) => return Ok(SessionStep::Failed(prompt_failure(err))),
    };

    match backend.resume_login(&challenge, code.trim()).await {
        Ok(bundle) => persist(store, bundle),
        Err(err) if err.is_rate_limited() => Err(SessionError::MfaRateLimited),
        Err(err) if err.is_auth_rejected() => {
            print_command_status(CommandStatus::Error, "Invalid or expired MFA code");
            Ok(SessionStep::NeedsMfa { challenge })
        }
        Err(err) => Err(SessionError::MfaTransport(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use chrono::{Duration, Utc};
    use reqwest::StatusCode;
    use tempfile::TempDir;

    use crate::http::ApiResult;

    fn status(code: u16) -> ApiError {
        ApiError::Status {
            status: StatusCode::from_u16(code).unwrap(),
            body: String::new(),
        }
    }

    fn token(name: &str) -> TokenBundle {
        TokenBundle {
            access_token: name.to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now() + Duration::hours(1)),
        }
    }

    #[derive(Default)]
    struct ScriptedBackend {
        logins: RefCell<VecDeque<ApiResult<LoginResponse>>>,
        resumes: RefCell<VecDeque<ApiResult<TokenBundle>>>,
        seen_credentials: RefCell<Vec<(String, String)>>,
        seen_codes: RefCell<Vec<String>>,
        revoked: Vec<String>,
        validated: RefCell<Vec<String>>,
    }

    impl ScriptedBackend {
        fn login_replies(self, replies: Vec<ApiResult<LoginResponse>>) -> Self {
            *self.logins.borrow_mut() = replies.into();
            self
        }

        fn resume_replies(self, replies: Vec<ApiResult<TokenBundle>>) -> Self {
            *self.resumes.borrow_mut() = replies.into();
            self
        }

        fn revoking(mut self, access_token: &str) -> Self {
            self.revoked.push(access_token.to_string());
            self
        }
    }

    impl AuthBackend for ScriptedBackend {
        async fn login(&self, credentials: &Credentials) -> ApiResult<LoginResponse> {
            self.seen_credentials
                .borrow_mut()
                .push((credentials.email.clone(), credentials.password.clone()));
            self.logins
                .borrow_mut()
                .pop_front()
                .expect("unexpected login call")
        }

        async fn resume_login(&self, challenge: &str, code: &str) -> ApiResult<TokenBundle> {
            assert_eq!(challenge, "challenge-1");
            self.seen_codes.borrow_mut().push(code.to_string());
            self.resumes
                .borrow_mut()
                .pop_front()
                .expect("unexpected resume call")
        }

        async fn refresh(&self, _refresh_token: &str) -> ApiResult<TokenBundle> {
            Err(status(401))
        }

        async fn validate(&self, access_token: &str) -> ApiResult<()> {
            self.validated.borrow_mut().push(access_token.to_string());
            if self.revoked.iter().any(|t| t == access_token) {
                return Err(status(401));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct ScriptedPrompter {
        emails: VecDeque<Result<String, PromptError>>,
        passwords: VecDeque<Result<String, PromptError>>,
        codes: VecDeque<Result<String, PromptError>>,
        prompts: usize,
    }

    impl Prompter for ScriptedPrompter {
        fn email(&mut self) -> Result<String, PromptError> {
            self.prompts += 1;
            self.emails.pop_front().expect("unexpected email prompt")
        }

        fn password(&mut self) -> Result<String, PromptError> {
            self.prompts += 1;
            self.passwords.pop_front().expect("unexpected password prompt")
        }

        fn mfa_code(&mut self) -> Result<String, PromptError> {
            self.prompts += 1;
            self.codes.pop_front().expect("unexpected MFA prompt")
        }
    }

    fn hints(email: &str, password: &str) -> CredentialHints {
        CredentialHints {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        }
    }

    fn store(dir: &TempDir) -> TokenStore {
        TokenStore::new(dir.path().join("tokens"), None)
    }

    #[tokio::test]
    async fn stored_bundle_short_circuits_login() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save(&token("stored")).unwrap();
        let backend = ScriptedBackend::default();
        let mut prompter = ScriptedPrompter::default();

        let outcome = acquire_session(&backend, &store, hints("a", "b"), &mut prompter)
            .await
            .unwrap();
        let SessionOutcome::Ready(session) = outcome else {
            panic!("expected session");
        };
        assert_eq!(session.origin, SessionOrigin::Restored);
        assert_eq!(session.bundle.access_token, "stored");
        assert_eq!(*backend.validated.borrow(), vec!["stored"]);
        assert!(backend.seen_credentials.borrow().is_empty());
        assert_eq!(prompter.prompts, 0);
    }

    #[tokio::test]
    async fn revoked_stored_bundle_falls_back_to_login() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store
            .save(&TokenBundle {
                access_token: "revoked-by-server".to_string(),
                refresh_token: None,
                expires_at: None,
            })
            .unwrap();
        let backend = ScriptedBackend::default()
            .revoking("revoked-by-server")
            .login_replies(vec![Ok(LoginResponse::Authenticated(token("new")))]);
        let mut prompter = ScriptedPrompter::default();

        let outcome = acquire_session(&backend, &store, hints("a", "b"), &mut prompter)
            .await
            .unwrap();
        let SessionOutcome::Ready(session) = outcome else {
            panic!("expected session");
        };
        assert_eq!(session.origin, SessionOrigin::LoggedIn);
        assert_eq!(session.bundle.access_token, "new");
        assert_eq!(backend.seen_credentials.borrow().len(), 1);
        assert_eq!(store.load().unwrap().unwrap().access_token, "new");
    }

    #[tokio::test]
    async fn fresh_login_persists_bundle() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let backend = ScriptedBackend::default()
            .login_replies(vec![Ok(LoginResponse::Authenticated(token("fresh")))]);
        let mut prompter = ScriptedPrompter::default();

        let outcome = acquire_session(&backend, &store, hints("me@x", "pw"), &mut prompter)
            .await
            .unwrap();
        let SessionOutcome::Ready(session) = outcome else {
            panic!("expected session");
        };
        assert_eq!(session.origin, SessionOrigin::LoggedIn);
        assert_eq!(store.load().unwrap().unwrap().access_token, "fresh");
        assert_eq!(prompter.prompts, 0);
    }

    #[tokio::test]
    async fn rejected_credentials_are_cleared_and_prompted() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let backend = ScriptedBackend::default().login_replies(vec![
            Err(status(401)),
            Ok(LoginResponse::Authenticated(token("second"))),
        ]);
        let mut prompter = ScriptedPrompter {
            emails: VecDeque::from([Ok("typed@x".to_string())]),
            passwords: VecDeque::from([Ok("typed-pw".to_string())]),
            ..Default::default()
        };

        let outcome = acquire_session(&backend, &store, hints("env@x", "bad"), &mut prompter)
            .await
            .unwrap();
        assert!(matches!(outcome, SessionOutcome::Ready(_)));
        assert_eq!(
            *backend.seen_credentials.borrow(),
            vec![
                ("env@x".to_string(), "bad".to_string()),
                ("typed@x".to_string(), "typed-pw".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn invalid_mfa_code_is_reprompted() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let backend = ScriptedBackend::default()
            .login_replies(vec![Ok(LoginResponse::MfaRequired {
                challenge: "challenge-1".to_string(),
            })])
            .resume_replies(vec![Err(status(401)), Ok(token("after-mfa"))]);
        let mut prompter = ScriptedPrompter {
            codes: VecDeque::from([Ok("000000".to_string()), Ok(" 123456 ".to_string())]),
            ..Default::default()
        };

        let outcome = acquire_session(&backend, &store, hints("a", "b"), &mut prompter)
            .await
            .unwrap();
        let SessionOutcome::Ready(session) = outcome else {
            panic!("expected session");
        };
        assert_eq!(session.bundle.access_token, "after-mfa");
        assert_eq!(*backend.seen_codes.borrow(), vec!["000000", "123456"]);
        assert_eq!(backend.seen_credentials.borrow().len(), 1);
    }

    #[tokio::test]
    async fn mfa_rate_limit_is_fatal_without_reprompt() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let backend = ScriptedBackend::default()
            .login_replies(vec![Ok(LoginResponse::MfaRequired {
                challenge: "challenge-1".to_string(),
            })])
            .resume_replies(vec![Err(status(429))]);
        let mut prompter = ScriptedPrompter {
            codes: VecDeque::from([Ok("111111".to_string())]),
            ..Default::default()
        };

        let result = acquire_session(&backend, &store, hints("a", "b"), &mut prompter).await;
        assert!(matches!(result, Err(SessionError::MfaRateLimited)));
        assert_eq!(prompter.prompts, 1);
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn other_mfa_errors_are_fatal() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let backend = ScriptedBackend::default()
            .login_replies(vec![Ok(LoginResponse::MfaRequired {
                challenge: "challenge-1".to_string(),
            })])
            .resume_replies(vec![Err(status(500))]);
        let mut prompter = ScriptedPrompter {
            codes: VecDeque::from([Ok("111111".to_string())]),
            ..Default::default()
        };

        let result = acquire_session(&backend, &store, hints("a", "b"), &mut prompter).await;
        assert!(matches!(result, Err(SessionError::MfaTransport(_))));
    }

    #[tokio::test]
    async fn interrupt_during_prompt_means_no_session() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let backend = ScriptedBackend::default();
        let mut prompter = ScriptedPrompter {
            emails: VecDeque::from([Err(PromptError::Interrupted)]),
            ..Default::default()
        };

        let outcome = acquire_session(&backend, &store, CredentialHints::default(), &mut prompter)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            SessionOutcome::NoSession(FailureKind::Interrupted)
        ));
    }

    #[tokio::test]
    async fn interrupt_during_mfa_prompt_means_no_session() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let backend = ScriptedBackend::default().login_replies(vec![Ok(
            LoginResponse::MfaRequired {
                challenge: "challenge-1".to_string(),
            },
        )]);
        let mut prompter = ScriptedPrompter {
            codes: VecDeque::from([Err(PromptError::Interrupted)]),
            ..Default::default()
        };

        let outcome = acquire_session(&backend, &store, hints("a", "b"), &mut prompter)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            SessionOutcome::NoSession(FailureKind::Interrupted)
        ));
    }

    #[tokio::test]
    async fn unexpected_login_error_means_no_session() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let backend = ScriptedBackend::default().login_replies(vec![Err(status(502))]);
        let mut prompter = ScriptedPrompter::default();

        let outcome = acquire_session(&backend, &store, hints("a", "b"), &mut prompter)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            SessionOutcome::NoSession(FailureKind::Unexpected)
        ));
    }

    #[tokio::test]
    async fn expired_bundle_with_failed_refresh_falls_back_to_login() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store
            .save(&TokenBundle {
                access_token: "old".to_string(),
                refresh_token: Some("r".to_string()),
                expires_at: Some(Utc::now() - Duration::hours(1)),
            })
            .unwrap();
        let backend = ScriptedBackend::default()
            .login_replies(vec![Ok(LoginResponse::Authenticated(token("new")))]);
        let mut prompter = ScriptedPrompter::default();

        let outcome = acquire_session(&backend, &store, hints("a", "b"), &mut prompter)
            .await
            .unwrap();
        let SessionOutcome::Ready(session) = outcome else {
            panic!("expected session");
        };
        assert_eq!(session.origin, SessionOrigin::LoggedIn);
        assert_eq!(store.load().unwrap().unwrap().access_token, "new");
    }
}
