//! HTTP transport for the upstream feeds.

use std::time::Duration;

use log::debug;
use rocket::serde::json::serde_json;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::error::{Error, Result};

const USER_AGENT: &str = concat!("ballot-sync/", env!("CARGO_PKG_VERSION"));
const TIMEOUT: Duration = Duration::from_secs(60);

/// A failure below the HTTP layer: nothing usable came back.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Could not build HTTP client: {0}")]
    Client(String),
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },
}

/// A complete HTTP response. Any status is a successful fetch at this level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON, attributing failures to `url`.
    pub fn json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|source| Error::Decode {
            url: url.to_string(),
            source,
        })
    }
}

/// Something that can GET a URL.
#[rocket::async_trait]
pub trait Fetch: Send + Sync {
    async fn get(&self, url: &str) -> std::result::Result<FetchResponse, FetchError>;
}

/// The real thing, backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> std::result::Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(TIMEOUT)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[rocket::async_trait]
impl Fetch for HttpFetcher {
    async fn get(&self, url: &str) -> std::result::Result<FetchResponse, FetchError> {
        debug!("GET {url}");
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };
        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport)?;
        Ok(FetchResponse { status, body })
    }
}

#[cfg(test)]
pub(crate) use static_fetcher::StaticFetcher;
