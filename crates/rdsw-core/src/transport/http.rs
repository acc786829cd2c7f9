//! libcurl-backed transport.
//!
//! Runs in the current thread; call from `spawn_blocking` if used from async code.

use super::failure::ApiFailure;
use super::RdsTransport;
use anyhow::{Context, Result};
use serde_json::Value;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct CurlTransport {
    endpoint: Url,
    headers: Vec<(String, String)>,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl CurlTransport {
    /// `endpoint` is the RDS base URL, e.g. `https://rds.ap-southeast-1.myhuaweicloud.com/`.
    pub fn new(endpoint: &str) -> Result<Self> {
        let mut endpoint = endpoint.trim().to_string();
        // Url::join replaces the last segment unless the base ends with '/'.
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        let endpoint =
            Url::parse(&endpoint).with_context(|| format!("invalid RDS endpoint: {endpoint}"))?;
        Ok(Self {
            endpoint,
            headers: vec![("Accept".to_string(), "application/json".to_string())],
            connect_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(60),
        })
    }

    /// Send a pre-issued IAM token with every request.
    pub fn with_token(self, token: &str) -> Self {
        self.with_header("X-Auth-Token", token)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .push((name.trim().to_string(), value.trim().to_string()));
        self
    }

    pub fn with_timeouts(mut self, connect: Duration, request: Duration) -> Self {
        self.connect_timeout = connect;
        self.request_timeout = request;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn perform(&self, url: &Url) -> Result<(u32, Vec<u8>), curl::Error> {
        let mut body = Vec::new();

        let mut easy = curl::easy::Easy::new();
        easy.url(url.as_str())?;
        easy.follow_location(true)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.timeout(self.request_timeout)?;

        let mut list = curl::easy::List::new();
        for (k, v) in &self.headers {
            list.append(&format!("{}: {}", k, v))?;
        }
        easy.http_headers(list)?;

        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }

        let code = easy.response_code()?;
        Ok((code, body))
    }
}

impl RdsTransport for CurlTransport {
    fn get_json(&self, path: &str) -> Result<Value, ApiFailure> {
        let url = self
            .endpoint
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiFailure::transport(format!("invalid request path {path}: {e}")))?;
        tracing::debug!(url = %url, "GET");

        let (code, body) = self
            .perform(&url)
            .map_err(|e| ApiFailure::transport(format!("GET {url} failed: {e}")))?;
        let text = String::from_utf8_lossy(&body).into_owned();
        if !(200..300).contains(&code) {
            let status = u16::try_from(code).unwrap_or(u16::MAX);
            return Err(ApiFailure::from_status(status, text));
        }
        serde_json::from_str(&text)
            .map_err(|e| ApiFailure::transport(format!("invalid JSON from GET {url}: {e}")))
    }
}
