//! Origin fetch layer.
//!
//! The core only needs a narrow contract: given a URL (and the stored etag,
//! for conditional GETs), produce the response body plus the headers the
//! processor reads. Rate limiting, token rotation, and retry orchestration
//! live outside this crate.

use std::env;
use std::time::Duration;

use anyhow::{bail, Context};
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use reqwest::header;
use serde_json::{json, Value};

use crate::Result;

const TIMEOUT_SECS: u64 = 15;
static ACCEPT_VERSION: &str = "application/vnd.github.v3+json";

/// The slice of an HTTP response the processor consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedResponse {
    pub status: u16,
    pub etag: Option<String>,
    /// Raw `Link` header, if the endpoint paginates.
    pub link: Option<String>,
    pub body: Value,
}

pub enum FetchOutcome {
    /// Conditional GET hit: the stored document is still current.
    NotModified,
    Fetched(FetchedResponse),
}

pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str, prior_etag: Option<&str>) -> Result<FetchOutcome>;
}

pub struct GithubClient {
    http: HttpClient,
    token: String,
}

impl GithubClient {
    pub fn new() -> Result<GithubClient> {
        let token = env::var("GITHUB_TOKEN")
            .context("GITHUB_TOKEN must be set to reach the GitHub API")?;
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()?;
        Ok(GithubClient { http, token })
    }

    /// Every API call carries the same accept/agent/auth trio.
    fn get(&self, url: &str) -> RequestBuilder {
        self.http
            .get(url)
            .header(header::ACCEPT, ACCEPT_VERSION)
            .header(header::USER_AGENT, crate::USER_AGENT)
            .header(header::AUTHORIZATION, format!("token {}", self.token))
    }
}

impl Fetcher for GithubClient {
    fn fetch(&self, url: &str, prior_etag: Option<&str>) -> Result<FetchOutcome> {
        let mut request = self.get(url);
        if let Some(etag) = prior_etag {
            request = request.header(header::IF_NONE_MATCH, etag);
        }

        let response = request.send()?;
        if response.status() == reqwest::StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::NotModified);
        }
        if !response.status().is_success() {
            bail!("fetching {} failed: {:?}", url, response.status());
        }

        let status = response.status().as_u16();
        let etag = header_string(&response, header::ETAG);
        let link = header_string(&response, header::LINK);
        let body = wrap_listing(response.json()?);

        Ok(FetchOutcome::Fetched(FetchedResponse {
            status,
            etag,
            link,
            body,
        }))
    }
}

fn header_string(response: &reqwest::blocking::Response, name: header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

/// List endpoints return bare arrays; the collection handlers expect them
/// under an `elements` key.
pub fn wrap_listing(body: Value) -> Value {
    match body {
        Value::Array(elements) => json!({ "elements": elements }),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wrap_listing() {
        assert_eq!(
            json!({"elements": [1, 2]}),
            wrap_listing(json!([1, 2]))
        );
        assert_eq!(json!({"id": 1}), wrap_listing(json!({"id": 1})));
    }
}
