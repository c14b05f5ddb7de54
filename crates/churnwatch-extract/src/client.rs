use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;

use crate::error::ExtractError;
use crate::retry::retry_with_backoff;
use crate::types::{FollowerPage, RawProfile, TargetProfile};

/// Maximum number of follower pages to fetch before returning an error.
/// Prevents infinite loops on cycling cursors.
const MAX_PAGES: usize = 500;

/// HTTP client for the extraction service.
///
/// Handles rate limiting (429), not-found (404), and other non-2xx responses
/// as typed errors. Pagination is cursor-driven: each page body carries the
/// cursor for the next page, `null` on the last one.
///
/// Transient errors (429, network failures) are automatically retried with
/// exponential backoff up to `max_retries` additional attempts.
#[derive(Debug)]
pub struct ExtractionClient {
    client: Client,
    base_url: reqwest::Url,
    /// Maximum number of retry attempts after the first failure.
    max_retries: u32,
    /// Base delay in seconds for exponential backoff: `backoff_base_secs * 2^attempt`.
    backoff_base_secs: u64,
}

impl ExtractionClient {
    /// Creates an `ExtractionClient` with configured timeout, `User-Agent`,
    /// optional service bearer token, and retry policy.
    ///
    /// `max_retries` is the number of additional attempts after the first
    /// failure for retriable errors (429, network errors). Set to `0` to
    /// disable retries.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::InvalidBaseUrl`] if `base_url` does not parse,
    /// or [`ExtractError::Http`] if the underlying `reqwest::Client` cannot
    /// be constructed.
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_secs: u64,
    ) -> Result<Self, ExtractError> {
        let base_url = reqwest::Url::parse(base_url).map_err(|e| ExtractError::InvalidBaseUrl {
            base_url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        let mut default_headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                ExtractError::InvalidBaseUrl {
                    base_url: base_url.to_string(),
                    reason: format!("api key is not a valid header value: {e}"),
                }
            })?;
            default_headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .default_headers(default_headers)
            .build()?;

        Ok(Self {
            client,
            base_url,
            max_retries,
            backoff_base_secs,
        })
    }

    /// Fetches one page of followers for `handle`, with automatic retry on
    /// transient errors.
    ///
    /// An empty `profiles` array is a valid page. Callers drive pagination by
    /// passing the returned `next_cursor` back in until it is `None`.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::RateLimited`] — HTTP 429 after all retries exhausted.
    /// - [`ExtractError::NotFound`] — HTTP 404 (not retried); the handle is
    ///   unknown to the extraction service.
    /// - [`ExtractError::UnexpectedStatus`] — any other non-2xx status (not retried).
    /// - [`ExtractError::Http`] — network or TLS failure after all retries exhausted.
    /// - [`ExtractError::Deserialize`] — response body does not match the
    ///   page shape (not retried).
    pub async fn fetch_followers_page(
        &self,
        handle: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<FollowerPage, ExtractError> {
        let url = self.followers_url(handle, limit, cursor)?;

        retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            let url = url.clone();
            async move {
                let response = self.client.get(url.clone()).send().await?;
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(60);

                    return Err(ExtractError::RateLimited { retry_after_secs });
                }

                if status == reqwest::StatusCode::NOT_FOUND {
                    return Err(ExtractError::NotFound {
                        url: url.to_string(),
                    });
                }

                if !status.is_success() {
                    return Err(ExtractError::UnexpectedStatus {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }

                let body = response.text().await?;
                serde_json::from_str::<FollowerPage>(&body).map_err(|e| {
                    ExtractError::Deserialize {
                        context: format!("followers page for {handle}"),
                        source: e,
                    }
                })
            }
        })
        .await
    }

    /// Fetches every follower page for `handle` by following cursors until
    /// the service reports no next page.
    ///
    /// Pages are returned as fetched — deduplication across overlapping pages
    /// is the ingest fold's job, not the client's. `inter_request_delay_ms`
    /// is applied between page requests (after every page except the first).
    ///
    /// # Errors
    ///
    /// Propagates any error from [`Self::fetch_followers_page`]. Returns
    /// [`ExtractError::PaginationLimit`] if the number of pages exceeds
    /// [`MAX_PAGES`].
    pub async fn fetch_all_follower_pages(
        &self,
        handle: &str,
        limit: u32,
        inter_request_delay_ms: u64,
    ) -> Result<Vec<Vec<RawProfile>>, ExtractError> {
        let mut pages: Vec<Vec<RawProfile>> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut is_first_page = true;

        loop {
            if pages.len() >= MAX_PAGES {
                return Err(ExtractError::PaginationLimit {
                    handle: handle.to_owned(),
                    max_pages: MAX_PAGES,
                });
            }

            if !is_first_page && inter_request_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(inter_request_delay_ms)).await;
            }
            is_first_page = false;

            let page = self
                .fetch_followers_page(handle, limit, cursor.as_deref())
                .await?;

            cursor = page.next_cursor.clone();
            pages.push(page.profiles);

            if cursor.is_none() {
                break;
            }
        }

        Ok(pages)
    }

    /// Fetches the tracked account's own profile metadata.
    ///
    /// A dedicated endpoint, deliberately separate from the follower list —
    /// identity metadata and follower extraction are unrelated concerns with
    /// their own contracts.
    ///
    /// # Errors
    ///
    /// Same error surface as [`Self::fetch_followers_page`].
    pub async fn fetch_target_profile(&self, handle: &str) -> Result<TargetProfile, ExtractError> {
        let url = self.endpoint_url(&format!("v1/targets/{handle}/profile"))?;

        retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            let url = url.clone();
            async move {
                let response = self.client.get(url.clone()).send().await?;
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(60);

                    return Err(ExtractError::RateLimited { retry_after_secs });
                }

                if status == reqwest::StatusCode::NOT_FOUND {
                    return Err(ExtractError::NotFound {
                        url: url.to_string(),
                    });
                }

                if !status.is_success() {
                    return Err(ExtractError::UnexpectedStatus {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }

                let body = response.text().await?;
                serde_json::from_str::<TargetProfile>(&body).map_err(|e| {
                    ExtractError::Deserialize {
                        context: format!("target profile for {handle}"),
                        source: e,
                    }
                })
            }
        })
        .await
    }

    /// Builds the followers URL for the given handle, page size, and optional
    /// cursor. The cursor is attached via `query_pairs_mut` so opaque cursor
    /// values are always URL-encoded.
    fn followers_url(
        &self,
        handle: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<reqwest::Url, ExtractError> {
        let mut url = self.endpoint_url(&format!("v1/targets/{handle}/followers"))?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        if let Some(cursor) = cursor {
            url.query_pairs_mut().append_pair("cursor", cursor);
        }
        Ok(url)
    }

    fn endpoint_url(&self, path: &str) -> Result<reqwest::Url, ExtractError> {
        self.base_url
            .join(path)
            .map_err(|e| ExtractError::InvalidBaseUrl {
                base_url: self.base_url.to_string(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
