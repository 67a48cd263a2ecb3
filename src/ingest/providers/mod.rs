// src/ingest/providers/mod.rs
pub mod eventbrite;
pub mod openmic_us;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE};
use scraper::ElementRef;
use std::collections::HashMap;
use std::time::Duration;

use crate::ingest::types::SourceError;

pub use eventbrite::EventbriteAdapter;
pub use openmic_us::OpenMicUsAdapter;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Raw page access used by the adapters. Swapped for `StaticPages` in tests.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, SourceError>;
}

/// reqwest-backed fetcher with a browser User-Agent and a per-request timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, cookie: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        if let Some(c) = cookie {
            let value = HeaderValue::from_str(c).context("cookie is not a valid header value")?;
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, SourceError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::fetch(url, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::fetch(url, format!("HTTP {status}")));
        }
        resp.text().await.map_err(|e| SourceError::fetch(url, e))
    }
}

/// In-memory pages keyed by URL. Unknown URLs fail like a 404.
#[derive(Debug, Default, Clone)]
pub struct StaticPages {
    pages: HashMap<String, String>,
}

impl StaticPages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.insert(url.into(), body.into());
        self
    }
}

#[async_trait]
impl PageFetcher for StaticPages {
    async fn fetch(&self, url: &str) -> Result<String, SourceError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| SourceError::fetch(url, "HTTP 404 Not Found"))
    }
}

/// Text content of an element: each text node trimmed, empties dropped, space-joined.
pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// True if any class token of `el` matches `re`.
pub(crate) fn class_matches(el: &ElementRef<'_>, re: &regex::Regex) -> bool {
    el.value().classes().any(|c| re.is_match(c))
}
