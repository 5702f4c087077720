use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

const USER_AGENT: &str = concat!("fitsync/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed ({status}): {body}")]
    Status { status: StatusCode, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ApiError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(status.as_u16()),
            ApiError::Transport(err) => err.status().map(|s| s.as_u16()),
            ApiError::Decode { .. } => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status_code() == Some(429)
    }

    /// 401 and 403 both mean the remote refused the presented credentials.
    pub fn is_auth_rejected(&self) -> bool {
        matches!(self.status_code(), Some(401) | Some(403))
    }

    /// Network-level failures, as opposed to the server answering with an error.
    pub fn is_connection(&self) -> bool {
        match self {
            ApiError::Transport(err) => err.is_connect() || err.is_timeout() || err.is_request(),
            _ => false,
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Thin wrapper over reqwest that joins paths onto a base URL and
/// classifies non-success responses as [`ApiError::Status`].
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> ApiResult<Self> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Same base URL and connection pool, different bearer token.
    pub fn with_token(&self, token: &str) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            token: Some(token.to_string()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self.authorize(self.http.get(&url)).send().await?;
        decode_json(url, check_status(response).await?).await
    }

    /// Fetch a raw body. `Ok(None)` means the server had nothing to return
    /// (204 or an empty 200).
    pub async fn get_bytes(&self, path: &str) -> ApiResult<Option<Vec<u8>>> {
        let url = self.url(path);
        debug!(%url, "GET bytes");
        let response = self.authorize(self.http.get(&url)).send().await?;
        let response = check_status(response).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            Ok(None)
        } else {
            Ok(Some(bytes.to_vec()))
        }
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ApiResult<T> {
        let url = self.url(path);
        debug!(%url, "POST");
        let response = self
            .authorize(self.http.post(&url))
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;
        decode_json(url, check_status(response).await?).await
    }
}

async fn check_status(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status { status, body })
}

async fn decode_json<T: DeserializeOwned>(url: String, response: Response) -> ApiResult<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode {
        url,
        message: err.to_string(),
    })
}
