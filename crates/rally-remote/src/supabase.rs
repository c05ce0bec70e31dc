use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};

use rally_core::error::RallyError;

use crate::{RemoteStore, RemoteTable};

const PREFER_UPSERT: &str = "resolution=merge-duplicates,return=minimal";

/// PostgREST-backed remote, as exposed by Supabase at `{url}/rest/v1`.
pub struct SupabaseRemote {
    client: reqwest::Client,
    base_url: url::Url,
    timeout: Duration,
}

impl SupabaseRemote {
    pub fn new(base_url: url::Url, api_key: String, timeout: Duration) -> Result<Self, RallyError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&api_key).map_err(|e| RallyError::CredentialError {
            message: format!("API key is not a valid header value: {e}"),
        })?;
        headers.insert("apikey", key);
        if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
            headers.insert(header::AUTHORIZATION, val);
        }
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static(concat!("rally/", env!("CARGO_PKG_VERSION"))),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| RallyError::Network {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    fn rest_url(&self, path: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/rest/v1/{path}")
    }

    /// Insert-or-merge endpoint for `table`, keyed on its conflict columns.
    fn upsert_url(&self, table: RemoteTable) -> String {
        format!("{}?on_conflict={}", self.rest_url(table.name()), table.conflict_key())
    }

    fn transport_error(&self, operation: &str, e: reqwest::Error) -> RallyError {
        if e.is_timeout() {
            RallyError::Timeout {
                operation: operation.to_string(),
                secs: self.timeout.as_secs(),
            }
        } else {
            RallyError::Network {
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl RemoteStore for SupabaseRemote {
    async fn upsert(&self, table: RemoteTable, row: serde_json::Value) -> Result<(), RallyError> {
        let resp = self
            .client
            .post(self.upsert_url(table))
            .header("Prefer", PREFER_UPSERT)
            .json(&row)
            .send()
            .await
            .map_err(|e| self.transport_error(&format!("upsert {table}"), e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RallyError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }
        tracing::debug!(%table, "upserted row");
        Ok(())
    }

    async fn ping(&self) -> Result<(), RallyError> {
        self.client
            .head(self.rest_url(""))
            .send()
            .await
            .map_err(|e| self.transport_error("ping", e))?;
        Ok(())
    }
}
