//! STAC catalog access.
//!
//! [`CatalogClient`] pages through `/search` results for a collection, date
//! range and bounding box, turning each item into a [`Scene`]. The HTTP layer
//! sits behind [`HttpClient`] so the pipeline can run against a scripted
//! server.

mod client;
mod http;
mod request;
mod scene;
mod stac;

use std::time::Duration;

use thiserror::Error;

use crate::config::{DEFAULT_CATALOG_URL, DEFAULT_PAGE_LIMIT, DEFAULT_TIMEOUT_SECS};
use crate::executor::RetryPolicy;

pub use client::{BandResolutions, CatalogClient, Page, Pages, SearchOutcome, SearchStatus};
pub use http::{HttpClient, HttpError, ReqwestClient};
pub use request::{RequestError, SearchRequest};
pub use scene::{Asset, Scene, SceneSet, UNKNOWN};

#[cfg(test)]
pub(crate) use http::tests::MockHttpClient;
#[cfg(test)]
pub(crate) use scene::tests::scene as test_scene;

/// Delay before re-sending a request that timed out.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Errors returned by catalog requests.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The server answered with something that is not a STAC document.
    #[error("Invalid catalog response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },
}

impl CatalogError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CatalogError::Http(e) if e.is_timeout())
    }
}

/// Catalog endpoint and request settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogConfig {
    /// STAC API root, without trailing slash.
    pub url: String,
    pub timeout: Duration,
    /// Items requested per page.
    pub page_limit: usize,
    /// Applied to timed-out page requests.
    pub retry: RetryPolicy,
    pub verify_ssl: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CATALOG_URL)
    }
}

impl CatalogConfig {
    /// Creates settings for `url` with one retry on timeout.
    pub fn new(url: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            page_limit: DEFAULT_PAGE_LIMIT,
            retry: RetryPolicy::fixed(2, Duration::from_millis(DEFAULT_RETRY_DELAY_MS)),
            verify_ssl: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the page size. Zero is raised to one.
    pub fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = page_limit.max(1);
        self
    }

    /// Retries a timed-out page `retries` times after the first attempt.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retry = if retries == 0 {
            RetryPolicy::None
        } else {
            RetryPolicy::fixed(
                retries.saturating_add(1),
                Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            )
        };
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_verify_ssl(mut self, verify_ssl: bool) -> Self {
        self.verify_ssl = verify_ssl;
        self
    }

    /// `{url}/search`
    pub fn search_url(&self) -> String {
        format!("{}/search", self.url)
    }

    /// `{url}/collections/{id}`
    pub fn collection_url(&self, collection: &str) -> String {
        format!("{}/collections/{}", self.url, collection)
    }
}
