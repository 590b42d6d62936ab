//! Authenticated HTTP access to the Canvas REST API.
//!
//! Reads (`GET`) are retried on transport failures, throttling, and server
//! errors according to a [`Backoff`] schedule, honouring `Retry-After`.
//! Writes are sent exactly once: a failed comment or upload is reported, never
//! repeated, so it cannot be duplicated.

use std::time::Duration;

use coursework::{Backoff, GatewayError};
use reqwest::header::{HeaderMap, LINK};
use reqwest::multipart::Form;
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{error_detail, retry_after, status_error, transport_error, Operation};
use crate::CanvasError;

/// Page size requested from list endpoints; Canvas caps it at 100.
pub const PAGE_SIZE: &str = "100";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client bound to one Canvas instance and access token.
#[derive(Clone)]
pub struct CanvasClient {
    http: reqwest::Client,
    api_base: Url,
    token: String,
    backoff: Backoff,
}

impl std::fmt::Debug for CanvasClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasClient")
            .field("api_base", &self.api_base.as_str())
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl CanvasClient {
    /// `api_base` is the API root, e.g. `https://canvas.example.edu/api/v1`.
    pub fn new(
        api_base: &str,
        token: impl Into<String>,
        backoff: Backoff,
    ) -> Result<Self, CanvasError> {
        let mut base = api_base.trim().trim_end_matches('/').to_string();
        base.push('/');
        let api_base =
            Url::parse(&base).map_err(|_| CanvasError::InvalidBaseUrl(api_base.to_string()))?;
        if api_base.cannot_be_a_base() {
            return Err(CanvasError::InvalidBaseUrl(api_base.to_string()));
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("coursebridge/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_base,
            token: token.into(),
            backoff,
        })
    }

    /// Resolves an API path relative to the base URL and appends `query`.
    pub fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, GatewayError> {
        let mut url = self
            .api_base
            .join(path.trim_start_matches('/'))
            .map_err(|e| GatewayError::InvalidResponse(format!("bad endpoint {path}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Fetches and decodes a single resource.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        operation: Operation,
    ) -> Result<T, GatewayError> {
        let url = self.endpoint(path, query)?;
        let response = self.get_with_retry(url, operation).await?;
        response.json::<T>().await.map_err(transport_error)
    }

    /// Fetches every page of a list endpoint, following `Link: rel="next"`.
    pub async fn get_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        operation: Operation,
    ) -> Result<Vec<T>, GatewayError> {
        let mut query = query.to_vec();
        query.push(("per_page", PAGE_SIZE));
        let mut next = Some(self.endpoint(path, &query)?);

        let mut items = Vec::new();
        let mut pages = 0u32;
        while let Some(url) = next.take() {
            let response = self.get_with_retry(url, operation).await?;
            next = next_link(response.headers())
                .map(|link| Url::parse(&link))
                .transpose()
                .map_err(|e| GatewayError::InvalidResponse(format!("bad Link header: {e}")))?;
            let page: Vec<T> = response.json().await.map_err(transport_error)?;
            pages += 1;
            items.extend(page);
        }
        debug!(path, pages, items = items.len(), "listing fetched");
        Ok(items)
    }

    async fn get_with_retry(
        &self,
        url: Url,
        operation: Operation,
    ) -> Result<Response, GatewayError> {
        let mut attempt = 1;
        loop {
            let request = self.http.get(url.clone()).bearer_auth(&self.token);
            match send(request, operation).await {
                Ok(response) => return Ok(response),
                Err(err) => match self.backoff.delay_after(attempt, &err.retry_policy()) {
                    Some(delay) => {
                        warn!(
                            url = %url.path(),
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Canvas read failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(err),
                },
            }
        }
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Sends a form-encoded `PUT`, discarding the response body.
    pub async fn put_form(
        &self,
        path: &str,
        form: &[(&str, String)],
        operation: Operation,
    ) -> Result<(), GatewayError> {
        let url = self.endpoint(path, &[])?;
        let request = self.http.put(url).bearer_auth(&self.token).form(form);
        send(request, operation).await?;
        Ok(())
    }

    /// Sends a form-encoded `POST` and decodes the response.
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
        operation: Operation,
    ) -> Result<T, GatewayError> {
        let url = self.endpoint(path, &[])?;
        let request = self.http.post(url).bearer_auth(&self.token).form(form);
        send(request, operation)
            .await?
            .json()
            .await
            .map_err(transport_error)
    }

    /// Posts a multipart form to a file-storage URL handed out by Canvas.
    ///
    /// The URL is pre-signed, so no credential is attached.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        url: &str,
        form: Form,
        operation: Operation,
    ) -> Result<T, GatewayError> {
        let url = Url::parse(url)
            .map_err(|e| GatewayError::InvalidResponse(format!("bad upload URL: {e}")))?;
        let request = self.http.post(url).multipart(form);
        send(request, operation)
            .await?
            .json()
            .await
            .map_err(transport_error)
    }
}

/// Sends one request and turns a non-success status into a [`GatewayError`].
async fn send(request: RequestBuilder, operation: Operation) -> Result<Response, GatewayError> {
    let response = request.send().await.map_err(transport_error)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let delay = retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, delay, &error_detail(&body), operation))
}

/// Extracts the `rel="next"` target from a `Link` header.
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(|entry| {
            let mut parts = entry.split(';');
            let target = parts.next()?.trim();
            let is_next = parts.any(|param| {
                let param = param.trim();
                param == r#"rel="next""# || param == "rel=next"
            });
            if !is_next {
                return None;
            }
            target
                .strip_prefix('<')
                .and_then(|t| t.strip_suffix('>'))
                .map(str::to_string)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn client(base: &str) -> CanvasClient {
        CanvasClient::new(base, "secret", Backoff::none()).unwrap()
    }

    #[test]
    fn endpoint_joins_under_api_base() {
        let url = client("https://canvas.example.edu/api/v1")
            .endpoint("/courses/4/users", &[("enrollment_type[]", "student")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://canvas.example.edu/api/v1/courses/4/users?enrollment_type%5B%5D=student"
        );
    }

    #[test]
    fn trailing_slash_on_base_is_tolerated() {
        let url = client("https://canvas.example.edu/api/v1/")
            .endpoint("courses/4", &[])
            .unwrap();
        assert_eq!(url.as_str(), "https://canvas.example.edu/api/v1/courses/4");
    }

    #[test]
    fn invalid_base_is_rejected() {
        assert!(matches!(
            CanvasClient::new("not a url", "t", Backoff::none()),
            Err(CanvasError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn debug_output_hides_the_token() {
        let rendered = format!("{:?}", client("https://canvas.example.edu/api/v1"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn next_link_picks_the_next_relation() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                "<https://c.edu/api/v1/x?page=1>; rel=\"current\",\
                 <https://c.edu/api/v1/x?page=2>; rel=\"next\",\
                 <https://c.edu/api/v1/x?page=5>; rel=\"last\"",
            ),
        );
        assert_eq!(
            next_link(&headers).as_deref(),
            Some("https://c.edu/api/v1/x?page=2")
        );
    }

    #[test]
    fn last_page_has_no_next_link() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static("<https://c.edu/api/v1/x?page=5>; rel=\"last\""),
        );
        assert_eq!(next_link(&headers), None);
        assert_eq!(next_link(&HeaderMap::new()), None);
    }
}
