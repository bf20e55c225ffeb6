//! One-shot HTTP requests that hand back the raw response body.

use std::fmt::Debug;

use async_trait::async_trait;
use reqwest::{Client, Method};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for Method {
    fn from(value: HttpMethod) -> Self {
        match value {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        }
    }
}

/// Transport-level failures. HTTP status codes are not errors here.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to send {method} request to {url}: {source}")]
    Send {
        method: HttpMethod,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Issues a single request and resolves once with the body text.
///
/// Implementations must not retry and must not turn a non-2xx status into an
/// error; the body of an error response is returned like any other.
#[async_trait]
pub trait Fetcher: Send + Sync + Debug {
    async fn fetch(&self, method: HttpMethod, url: &str) -> Result<String, FetchError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self { http: Client::new() }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, method: HttpMethod, url: &str) -> Result<String, FetchError> {
        debug!(%method, url, "sending request");

        let res = self
            .http
            .request(method.into(), url)
            .send()
            .await
            .map_err(|source| FetchError::Send { method, url: url.to_string(), source })?;

        let status = res.status();
        let body =
            res.text().await.map_err(|source| FetchError::Body { url: url.to_string(), source })?;

        if !status.is_success() {
            warn!(%status, body = %truncate_body(&body), "request completed with non-success status");
        }

        Ok(body)
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_maps_to_reqwest() {
        assert_eq!(Method::from(HttpMethod::Get), Method::GET);
        assert_eq!(Method::from(HttpMethod::Post), Method::POST);
        assert_eq!(HttpMethod::Post.to_string(), "POST");
    }

    #[test]
    fn truncate_keeps_short_bodies() {
        assert_eq!(truncate_body("{}"), "{}");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let body = "é".repeat(150);
        let out = truncate_body(&body);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 203);
    }
}
