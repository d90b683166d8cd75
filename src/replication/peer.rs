//! Peer POD client
//!
//! Thin reqwest wrapper for the three internal endpoints served by the
//! other POD. Every call carries the configured connect and request
//! timeouts; a failure is returned, never retried here.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};

use super::errors::{ReplicationError, ReplicationResult};
use crate::bitset::RangeBitset;
use crate::provisioning::{is_accepted_content_type, ProvisioningSnapshot};

/// Snapshot endpoint
pub const PROV_PATH: &str = "/internal/prov";

/// Bitset (GET) and record fetch (POST) endpoint
pub const LOGS_PATH: &str = "/internal/logs";

/// Refresh push receiver
pub const FETCH_PROV_PATH: &str = "/internal/fetchProv";

/// Content type of bitset and log line bodies
pub const TEXT_PLAIN: &str = "text/plain";

/// Build the HTTP client shared by peer calls and pokes.
pub fn build_http_client(
    connect_timeout: Duration,
    request_timeout: Duration,
) -> ReplicationResult<Client> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .build()
        .map_err(|e| ReplicationError::configuration_error(format!("HTTP client: {}", e)))
}

/// Client for one peer POD
#[derive(Debug, Clone)]
pub struct PeerClient {
    http: Client,
    base_url: String,
}

impl PeerClient {
    /// Create a client for the peer at `base_url` (`scheme://host:port`).
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Pull the peer's full provisioning snapshot.
    pub async fn fetch_snapshot(&self) -> ReplicationResult<ProvisioningSnapshot> {
        let url = self.url(PROV_PATH);
        let response = self.http.get(&url).send().await?;
        let response = check_status(response, &url)?;

        let content_type = content_type_of(&response);
        if !is_accepted_content_type(&content_type) {
            return Err(ReplicationError::content_type(&content_type, &url));
        }

        let body = response.text().await?;
        ProvisioningSnapshot::from_json(&body)
            .map_err(|e| ReplicationError::decode(format!("{}: {}", url, e)))
    }

    /// Pull the peer's persisted record id bitset.
    pub async fn fetch_bitset(&self) -> ReplicationResult<RangeBitset> {
        let url = self.url(LOGS_PATH);
        let response = self.http.get(&url).send().await?;
        let response = check_status(response, &url)?;
        require_text_plain(&response, &url)?;

        let body = response.text().await?;
        body.parse::<RangeBitset>()
            .map_err(|e| ReplicationError::decode(format!("{}: {}", url, e)))
    }

    /// Ask the peer for the records in `wanted`, as `LOG` lines.
    pub async fn fetch_records(&self, wanted: &RangeBitset) -> ReplicationResult<String> {
        let url = self.url(LOGS_PATH);
        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, TEXT_PLAIN)
            .body(wanted.to_string())
            .send()
            .await?;
        let response = check_status(response, &url)?;
        require_text_plain(&response, &url)?;

        Ok(response.text().await?)
    }
}

/// Send a refresh push to `url`. The response body is ignored.
pub async fn poke(http: &Client, url: &str) -> ReplicationResult<()> {
    let response = http.get(url).send().await?;
    check_status(response, url)?;
    Ok(())
}

fn check_status(response: Response, url: &str) -> ReplicationResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ReplicationError::status(status.as_u16(), url))
    }
}

fn content_type_of(response: &Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn require_text_plain(response: &Response, url: &str) -> ReplicationResult<()> {
    let content_type = content_type_of(response);
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    if essence.eq_ignore_ascii_case(TEXT_PLAIN) {
        Ok(())
    } else {
        Err(ReplicationError::content_type(&content_type, url))
    }
}
