use std::fmt;
use std::fs;
use std::io::{self, Write as _};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::args::BaseArgs;
use crate::config::Settings;
use crate::http::{ApiClient, ApiError, ApiResult};
use crate::ui::{print_command_status, CommandStatus};

const BUNDLE_FILE_NAME: &str = "session.json";
/// Treat tokens this close to expiry as already expired.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, Args)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthSubcommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum AuthSubcommand {
    /// Display the stored access token and its TTL
    Token(TokenArgs),
    /// Remove the stored token bundle
    Logout,
}

#[derive(Debug, Clone, Args)]
pub struct TokenArgs {
    /// Show full token (default: masked)
    #[arg(long)]
    pub show: bool,
}

#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// Persisted proof of authentication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenBundle {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + Duration::seconds(EXPIRY_SKEW_SECS) >= expires_at,
            None => false,
        }
    }

    /// Keep the old refresh token when the refresh response omits one.
    fn refreshed(&self, mut fresh: TokenBundle) -> TokenBundle {
        if fresh.refresh_token.is_none() {
            fresh.refresh_token = self.refresh_token.clone();
        }
        fresh
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    pub fn into_bundle(self, now: DateTime<Utc>) -> TokenBundle {
        TokenBundle {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_in.map(|secs| now + Duration::seconds(secs)),
        }
    }
}

/// On-disk home of the token bundle: a directory, plus an optional file
/// holding the same JSON base64-encoded (useful for CI secrets).
#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
    base64_path: Option<PathBuf>,
}

impl TokenStore {
    pub fn new(dir: impl Into<PathBuf>, base64_path: Option<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            base64_path,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.tokenstore.clone(),
            Some(settings.tokenstore_base64.clone()),
        )
    }

    pub fn bundle_path(&self) -> PathBuf {
        self.dir.join(BUNDLE_FILE_NAME)
    }

    pub fn load(&self) -> Result<Option<TokenBundle>> {
        let path = self.bundle_path();
        match fs::read(&path) {
            Ok(bytes) => {
                let bundle = serde_json::from_slice(&bytes)
                    .with_context(|| format!("failed to parse {}", path.display()))?;
                return Ok(Some(bundle));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        }

        let Some(base64_path) = &self.base64_path else {
            return Ok(None);
        };
        let encoded = match fs::read_to_string(base64_path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read {}", base64_path.display()))
            }
        };
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .with_context(|| format!("{} is not valid base64", base64_path.display()))?;
        let bundle = serde_json::from_slice(&decoded)
            .with_context(|| format!("failed to parse token bundle in {}", base64_path.display()))?;
        debug!(path = %base64_path.display(), "restored token bundle from base64 store");
        Ok(Some(bundle))
    }

    pub fn save(&self, bundle: &TokenBundle) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.bundle_path();
        let tmp = path.with_extension("tmp");
        let json = serde_json::to_vec_pretty(bundle)?;

        let mut file = fs::File::create(&tmp)
            .with_context(|| format!("failed to create {}", tmp.display()))?;
        restrict_permissions(&file)?;
        file.write_all(&json)?;
        file.sync_all()?;
        fs::rename(&tmp, &path).with_context(|| {
            format!(
                "failed to move temporary file {} to {}",
                tmp.display(),
                path.display()
            )
        })?;
        Ok(())
    }

    /// Returns whether anything was removed.
    pub fn clear(&self) -> Result<bool> {
        let path = self.bundle_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err).with_context(|| format!("failed to remove {}", path.display())),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(file: &fs::File) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o600))
        .context("failed to restrict token file permissions")
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &fs::File) -> Result<()> {
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoginResponse {
    Authenticated(TokenBundle),
    MfaRequired { challenge: String },
}

/// The vendor's authentication endpoints.
#[allow(async_fn_in_trait)]
pub trait AuthBackend {
    async fn login(&self, credentials: &Credentials) -> ApiResult<LoginResponse>;

    async fn resume_login(&self, challenge: &str, code: &str) -> ApiResult<TokenBundle>;

    async fn refresh(&self, refresh_token: &str) -> ApiResult<TokenBundle>;

    /// Ask the service whether `access_token` is still accepted.
    async fn validate(&self, access_token: &str) -> ApiResult<()>;
}

pub struct HttpAuthBackend {
    client: ApiClient,
}

impl HttpAuthBackend {
    pub fn new(auth_url: &str) -> ApiResult<Self> {
        Ok(Self {
            client: ApiClient::new(auth_url, None)?,
        })
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginReply {
    #[serde(default)]
    mfa_required: bool,
    #[serde(default)]
    challenge: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl LoginReply {
    fn into_token(self) -> Option<TokenResponse> {
        Some(TokenResponse {
            access_token: self.access_token.filter(|t| !t.is_empty())?,
            refresh_token: self.refresh_token,
            expires_in: self.expires_in,
        })
    }
}

#[derive(Debug, Serialize)]
struct MfaRequest<'a> {
    challenge: &'a str,
    code: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

impl AuthBackend for HttpAuthBackend {
    async fn login(&self, credentials: &Credentials) -> ApiResult<LoginResponse> {
        let body = LoginRequest {
            email: &credentials.email,
            password: &credentials.password,
        };
        let reply: LoginReply = self.client.post("/login", &body).await?;
        if reply.mfa_required {
            let challenge = reply.challenge.ok_or_else(|| ApiError::Decode {
                url: self.client.url("/login"),
                message: "MFA required but no challenge returned".to_string(),
            })?;
            return Ok(LoginResponse::MfaRequired { challenge });
        }
        let token = reply.into_token().ok_or_else(|| ApiError::Decode {
            url: self.client.url("/login"),
            message: "login succeeded without an access token".to_string(),
        })?;
        Ok(LoginResponse::Authenticated(token.into_bundle(Utc::now())))
    }

    async fn resume_login(&self, challenge: &str, code: &str) -> ApiResult<TokenBundle> {
        let body = MfaRequest { challenge, code };
        let token: TokenResponse = self.client.post("/mfa", &body).await?;
        Ok(token.into_bundle(Utc::now()))
    }

    async fn refresh(&self, refresh_token: &str) -> ApiResult<TokenBundle> {
        let body = RefreshRequest { refresh_token };
        let token: TokenResponse = self.client.post("/refresh", &body).await?;
        Ok(token.into_bundle(Utc::now()))
    }

    async fn validate(&self, access_token: &str) -> ApiResult<()> {
        self.client
            .with_token(access_token)
            .get_bytes("/session")
            .await
            .map(|_| ())
    }
}

/// Load the stored bundle, refreshing it through `backend` if it has expired
/// and otherwise checking with `backend` that the token is still accepted.
/// `Ok(None)` means the caller has to log in again.
pub async fn restore_bundle<A: AuthBackend>(
    backend: &A,
    store: &TokenStore,
) -> Result<Option<(TokenBundle, bool)>> {
    let Some(bundle) = store.load()? else {
        return Ok(None);
    };
    if !bundle.is_expired(Utc::now()) {
        return match backend.validate(&bundle.access_token).await {
            Ok(()) => Ok(Some((bundle, false))),
            Err(err) if err.is_auth_rejected() || err.is_connection() => {
                debug!(error = %err, "stored token not usable");
                Ok(None)
            }
            Err(err) => Err(anyhow!(err).context("token validation failed")),
        };
    }
    let Some(refresh_token) = bundle.refresh_token.as_deref() else {
        debug!("stored token expired and has no refresh token");
        return Ok(None);
    };

    let fresh = backend
        .refresh(refresh_token)
        .await
        .map_err(|err| anyhow!(err).context("token refresh failed"))?;
    let fresh = bundle.refreshed(fresh);
    store.save(&fresh)?;
    Ok(Some((fresh, true)))
}

pub fn run(base: BaseArgs, args: AuthArgs) -> Result<()> {
    let settings = Settings::resolve(&base)?;
    let store = TokenStore::from_settings(&settings);
    match args.command {
        AuthSubcommand::Token(token) => run_token(base.json, &store, token),
        AuthSubcommand::Logout => run_logout(&store),
    }
}

fn run_token(json: bool, store: &TokenStore, args: TokenArgs) -> Result<()> {
    let bundle = store.load()?.ok_or_else(|| {
        anyhow!(
            "no token bundle at {}. Run `fitsync login` first",
            store.bundle_path().display()
        )
    })?;

    let token_display = if args.show {
        bundle.access_token.clone()
    } else {
        mask_token(&bundle.access_token)
    };
    let ttl_seconds = bundle
        .expires_at
        .map(|exp| (exp - Utc::now()).num_seconds());

    if json {
        let output = serde_json::json!({
            "token": token_display,
            "expires_at": bundle.expires_at,
            "ttl_seconds": ttl_seconds,
            "refreshable": bundle.refresh_token.is_some(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Token: {token_display}");
    match (bundle.expires_at, ttl_seconds) {
        (Some(expires_at), Some(ttl)) if ttl > 0 => {
            println!("Expires: {expires_at} (in {ttl} seconds)")
        }
        (Some(expires_at), _) => println!("Expires: {expires_at} (EXPIRED)"),
        _ => println!("Expires: Never"),
    }
    Ok(())
}

fn run_logout(store: &TokenStore) -> Result<()> {
    if store.clear()? {
        print_command_status(CommandStatus::Success, "Removed stored session");
    } else {
        print_command_status(CommandStatus::Warning, "No stored session (already logged out)");
    }
    Ok(())
}

pub fn mask_token(token: &str) -> String {
    if token.chars().count() <= 8 {
        return "***".to_string();
    }
    let head: String = token.chars().take(4).collect();
    let tail: String = token
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{head}...{tail}")
}
