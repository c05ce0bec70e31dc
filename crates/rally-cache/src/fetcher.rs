use std::time::Duration;

use async_trait::async_trait;

use rally_core::error::RallyError;
use rally_core::models::http::{CacheRequest, CachedResponse};

/// Network access for the proxy. Any HTTP status is `Ok`; only a failure to
/// get a response at all is `Err`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &CacheRequest) -> Result<CachedResponse, RallyError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, RallyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rally/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RallyError::Network {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &CacheRequest) -> Result<CachedResponse, RallyError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            RallyError::Other(format!("invalid method {}: {e}", request.method))
        })?;

        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                RallyError::Timeout {
                    operation: format!("fetch {}", request.url),
                    secs: self.timeout.as_secs(),
                }
            } else {
                RallyError::Network {
                    message: e.to_string(),
                }
            }
        };

        let resp = self
            .client
            .request(method, request.url.clone())
            .send()
            .await
            .map_err(map_err)?;

        let status = resp.status();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = resp.bytes().await.map_err(map_err)?;

        Ok(CachedResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: body.to_vec(),
        })
    }
}
