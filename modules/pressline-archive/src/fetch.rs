// Authenticated GET capability shared by all adapters.
//
// Adapters describe a request (URL, query, vendor headers); credentials are
// layered on by the fetcher. PageFetcher is the seam tests mock.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::{ArchiveError, Result};

/// One GET request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and body of a completed request. Non-success statuses are returned,
/// not raised, so callers can capture the body before deciding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBody {
    pub status: u16,
    pub body: String,
}

impl FetchedBody {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedBody>;

    /// Save a successful response body to `dest` and return the status. The
    /// file only appears once complete; non-success statuses write nothing.
    async fn download(&self, request: &FetchRequest, dest: &Path) -> Result<u16> {
        let fetched = self.fetch(request).await?;
        if fetched.is_success() {
            let part = partial_path(dest);
            write_file(&part, fetched.body.as_bytes()).await?;
            finish_download(&part, dest).await?;
        }
        Ok(fetched.status)
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ArchiveError::io(parent, e))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| ArchiveError::io(path, e))
}

async fn finish_download(part: &Path, dest: &Path) -> Result<()> {
    tokio::fs::rename(part, dest)
        .await
        .map_err(|e| ArchiveError::io(dest, e))
}

/// Browser session for the microblog web API: cookies plus the tokens derived from them.
#[derive(Clone)]
pub struct Session {
    pub bearer_token: String,
    pub csrf_token: String,
    pub cookies: BTreeMap<String, String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("cookies", &self.cookies.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Build a session from a JSON object of cookie name → value. `ct0` is required.
    pub fn from_cookie_json(json: &str, bearer_token: &str) -> Result<Self> {
        let cookies: BTreeMap<String, String> = serde_json::from_str(json)
            .map_err(|e| ArchiveError::Credentials(format!("cookie file is not a JSON object of strings: {e}")))?;
        let csrf_token = cookies
            .get("ct0")
            .cloned()
            .ok_or_else(|| ArchiveError::Credentials("cookie file has no ct0 cookie".to_string()))?;
        Ok(Self {
            bearer_token: bearer_token.to_string(),
            csrf_token,
            cookies,
        })
    }

    pub fn load(cookie_path: &Path, bearer_token: &str) -> Result<Self> {
        let json = std::fs::read_to_string(cookie_path).map_err(|e| ArchiveError::io(cookie_path, e))?;
        Self::from_cookie_json(&json, bearer_token)
    }
}

/// The ways an adapter authenticates.
#[derive(Debug, Clone)]
pub enum Credentials {
    None,
    /// Plain API key sent as the `key` query parameter.
    ApiKey(String),
    /// Bearer + CSRF headers; cookies travel through the client's cookie jar.
    Session(Session),
}

impl Credentials {
    /// Add the credential's query parameters and headers to a request.
    pub fn apply(&self, request: FetchRequest) -> FetchRequest {
        match self {
            Credentials::None => request,
            Credentials::ApiKey(key) => request.query("key", key.clone()),
            Credentials::Session(session) => request
                .header("authorization", format!("Bearer {}", session.bearer_token))
                .header("x-csrf-token", session.csrf_token.clone()),
        }
    }
}

/// reqwest-backed fetcher. No timeout beyond the transport defaults.
pub struct HttpFetcher {
    client: reqwest::Client,
    credentials: Credentials,
}

impl HttpFetcher {
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_cookie_url(credentials, None)
    }

    /// Build a fetcher whose cookie jar is seeded with the session cookies for `cookie_url`.
    pub fn with_cookie_url(credentials: Credentials, cookie_url: Option<&str>) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        if let (Credentials::Session(session), Some(cookie_url)) = (&credentials, cookie_url) {
            let url: url::Url = cookie_url
                .parse()
                .map_err(|e| ArchiveError::Credentials(format!("invalid cookie url {cookie_url}: {e}")))?;
            for (name, value) in &session.cookies {
                jar.add_cookie_str(&format!("{name}={value}; Path=/"), &url);
            }
        }

        let client = reqwest::Client::builder()
            .cookie_provider(jar)
            .build()
            .map_err(|e| ArchiveError::Network {
                url: String::new(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            credentials,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedBody> {
        let request = self.credentials.apply(request.clone());
        info!(url = %request.url, "Request");

        let mut builder = self.client.get(&request.url).query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let network = |e: reqwest::Error| ArchiveError::Network {
            url: request.url.clone(),
            message: e.to_string(),
        };
        let resp = builder.send().await.map_err(network)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(network)?;

        Ok(FetchedBody { status, body })
    }

    /// Streams the body to disk chunk by chunk; export parts can be large.
    async fn download(&self, request: &FetchRequest, dest: &Path) -> Result<u16> {
        let request = self.credentials.apply(request.clone());
        info!(url = %request.url, dest = %dest.display(), "Download");

        let network = |e: reqwest::Error| ArchiveError::Network {
            url: request.url.clone(),
            message: e.to_string(),
        };
        let mut resp = self
            .client
            .get(&request.url)
            .query(&request.query)
            .send()
            .await
            .map_err(network)?;
        let status = resp.status();
        if !status.is_success() {
            return Ok(status.as_u16());
        }

        let part = partial_path(dest);
        if let Some(parent) = part.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ArchiveError::io(parent, e))?;
        }
        let mut file = tokio::fs::File::create(&part)
            .await
            .map_err(|e| ArchiveError::io(&part, e))?;
        while let Some(chunk) = resp.chunk().await.map_err(network)? {
            file.write_all(&chunk)
                .await
                .map_err(|e| ArchiveError::io(&part, e))?;
        }
        file.sync_all().await.map_err(|e| ArchiveError::io(&part, e))?;
        finish_download(&part, dest).await?;

        Ok(status.as_u16())
    }
}
