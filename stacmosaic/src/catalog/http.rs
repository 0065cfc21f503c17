//! HTTP client abstraction for testability

use std::time::Duration;

use thiserror::Error;

/// Transport-level failures of a catalog request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HttpError {
    /// The request did not complete within the configured timeout.
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    /// The server answered with a non-success status.
    #[error("HTTP {code} from {url}: {body}")]
    Status { url: String, code: u16, body: String },

    /// Connection, TLS or body read failure.
    #[error("Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
}

impl HttpError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpError::Timeout { .. })
    }
}

/// Trait for HTTP client operations.
///
/// Lets the catalog client run against a scripted server in tests.
pub trait HttpClient: Send + Sync {
    /// Performs a GET request with the given query parameters and returns
    /// the response body.
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>, HttpError>;
}

impl<T: HttpClient + ?Sized> HttpClient for std::sync::Arc<T> {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>, HttpError> {
        (**self).get(url, query)
    }
}

/// Blocking HTTP client backed by reqwest.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a client with the given per-request timeout.
    ///
    /// With `verify_ssl` off, invalid server certificates are accepted.
    pub fn new(timeout: Duration, verify_ssl: bool) -> Result<Self, HttpError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_ssl)
            .user_agent(concat!("stacmosaic/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Transport {
                url: String::new(),
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }
}

fn map_reqwest_error(url: &str, e: reqwest::Error) -> HttpError {
    if e.is_timeout() {
        HttpError::Timeout {
            url: url.to_string(),
        }
    } else {
        HttpError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>, HttpError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|e| map_reqwest_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(HttpError::Status {
                url: url.to_string(),
                code: status.as_u16(),
                body,
            });
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| map_reqwest_error(url, e))
    }
}
