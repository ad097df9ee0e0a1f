//! Catalog HTTP client.
//!
//! Async HTTP client using `reqwest` with basic authentication on every
//! request.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::time::Duration;

use futures_util::TryStreamExt;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Method, Response};
use rommend_protocol::constants::{LOGIN_ENDPOINT, ROMS_ENDPOINT};
use rommend_protocol::{CatalogItem, TransferRequest};
use rommend_transfer::{OpenedPayload, PayloadSource, SourceError};
use tokio_util::io::StreamReader;
use tracing::{debug, info};

use crate::types::ItemList;

/// Characters escaped inside a single URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const USER_AGENT: &str = concat!("rommend/", env!("CARGO_PKG_VERSION"));

/// Errors from the catalog client.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid username or password")]
    Unauthorized,

    #[error("invalid host: {0:?}")]
    InvalidHost(String),
}

/// Turns a configured host into a base URL without trailing slash.
///
/// A bare host (`romm.example.com`) implies `https://`; a full URL is kept
/// as given.
pub fn normalize_base_url(host: &str) -> Result<String, CatalogError> {
    let trimmed = host.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(CatalogError::InvalidHost(host.to_string()));
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("https://{trimmed}"))
    }
}

/// Catalog API client.
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl CatalogClient {
    /// Creates a client for `host` authenticating as `username`.
    pub fn new(host: &str, username: &str, password: &str) -> Result<Self, CatalogError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: normalize_base_url(host)?,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
    }

    /// Verifies the credentials against the login endpoint.
    pub async fn login(&self) -> Result<(), CatalogError> {
        let url = format!("{}{LOGIN_ENDPOINT}", self.base_url);
        let resp = self.request(Method::POST, &url).send().await?;
        match resp.status().as_u16() {
            401 | 403 => Err(CatalogError::Unauthorized),
            _ => {
                check_status(resp).await?;
                info!(host = %self.base_url, user = %self.username, "logged in");
                Ok(())
            }
        }
    }

    /// Fetches every catalog item.
    pub async fn list_items(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        let url = format!("{}{ROMS_ENDPOINT}", self.base_url);
        let resp = self.request(Method::GET, &url).send().await?;
        let resp = check_status(resp).await?;
        let body = resp.bytes().await?;
        let list: ItemList = serde_json::from_slice(&body)?;
        let items = list.into_items();
        debug!(count = items.len(), "catalog listed");
        Ok(items)
    }

    /// URL of the raw content of item `id`.
    pub fn content_url(&self, id: u64, fs_name: &str) -> String {
        let encoded = utf8_percent_encode(fs_name, PATH_SEGMENT);
        format!("{}{ROMS_ENDPOINT}/{id}/content/{encoded}", self.base_url)
    }

    /// Resolves a possibly server-relative URL against the base URL.
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if url.starts_with('/') {
            format!("{}{url}", self.base_url)
        } else {
            format!("{}/{url}", self.base_url)
        }
    }

    /// Absolute cover URL of `item`, if it has one.
    pub fn cover_url(&self, item: &CatalogItem) -> Option<String> {
        item.cover_url().map(|url| self.resolve_url(url))
    }

    /// Downloads image data from a URL.
    pub async fn download_image(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        let url = self.resolve_url(url);
        let resp = self.request(Method::GET, &url).send().await?;
        let resp = check_status(resp).await?;
        Ok(resp.bytes().await?.to_vec())
    }
}

/// Passes successful responses through and turns the rest into
/// [`CatalogError::Api`].
async fn check_status(resp: Response) -> Result<Response, CatalogError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(CatalogError::Api {
        status: status.as_u16(),
        body,
    })
}

impl PayloadSource for CatalogClient {
    fn open<'a>(
        &'a self,
        request: &'a TransferRequest,
    ) -> Pin<Box<dyn Future<Output = Result<OpenedPayload, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let url = self.content_url(request.remote_id, &request.payload_name);
            let resp = self
                .request(Method::GET, &url)
                .send()
                .await
                .map_err(|e| SourceError::Connection(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(SourceError::Status(status.as_u16()));
            }

            let total_len = resp.content_length();
            let stream = resp.bytes_stream().map_err(io::Error::other);
            let body = StreamReader::new(Box::pin(stream));
            Ok(OpenedPayload::new(total_len, Box::new(body)))
        })
    }
}
