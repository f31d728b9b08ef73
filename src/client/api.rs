//! Reddit API client
//!
//! This module handles every outbound request, including:
//! - Building the HTTP client with the configured user agent
//! - Token acquisition and refresh
//! - Rate limiting and human-like pacing before each request
//! - Retry logic for transient failures
//! - Status classification of `about` lookups

use crate::client::info::FetchOutcome;
use crate::client::session::{authenticate, TokenSession};
use crate::client::{ApiError, ClientStats};
use crate::config::{delay_from_secs, ApiConfig, Credentials, PacingConfig};
use crate::limiter::{Backoff, RateLimiter};
use crate::state::Classification;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::{header::RETRY_AFTER, redirect::Policy, Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Wait applied to a 429 without a usable `Retry-After` header
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Bound on back-to-back 401/429 retries, which consume no attempt
pub const MAX_FREE_RETRIES: u32 = 10;

/// Page size for listing requests
const LISTING_PAGE_SIZE: usize = 100;

/// Unrelated endpoints mixed into the traffic
pub const COVER_ENDPOINTS: [&str; 4] = [
    "/hot",
    "/new",
    "/r/all/hot?limit=5",
    "/r/popular/hot?limit=5",
];

/// Terminal outcome of a request
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Json(Value),
    NotFound,
    Forbidden,
    /// 3xx; the API redirects lookups of names that do not exist
    Redirect,
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are never followed: a redirect is itself the answer.
pub fn build_http_client(config: &ApiConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Parses a `Retry-After` value given in seconds
///
/// Negative, non-numeric and unrepresentable values yield `None`.
pub fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    let secs = value?.trim().parse::<f64>().ok()?;
    if secs < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}

/// Authenticated, paced client for the Reddit API
pub struct ApiClient {
    http: Client,
    api_base: String,
    auth_url: String,
    credentials: Credentials,
    limiter: Arc<RateLimiter>,
    pacing: PacingConfig,
    max_retries: u32,
    /// Stop retrying 429s once this many were seen in total
    rate_limit_budget: Option<u64>,
    session: Option<TokenSession>,
    stats: ClientStats,
}

impl ApiClient {
    pub fn new(
        api: &ApiConfig,
        pacing: &PacingConfig,
        credentials: Credentials,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            http: build_http_client(api)?,
            api_base: api.api_base.trim_end_matches('/').to_string(),
            auth_url: api.auth_url.clone(),
            credentials,
            limiter,
            pacing: pacing.clone(),
            max_retries: api.max_retries.max(1),
            rate_limit_budget: None,
            session: None,
            stats: ClientStats::default(),
        })
    }

    /// Authenticates up front so bad credentials fail before any work starts
    pub async fn initialize(&mut self) -> Result<(), ApiError> {
        self.authenticate().await?;
        tracing::debug!("Reddit API client initialized");
        Ok(())
    }

    /// Caps the total number of 429 responses the client keeps retrying
    ///
    /// Once `max` 429s were seen, the next one ends the request with
    /// `ApiError::Throttled` instead of sleeping and retrying.
    pub fn set_rate_limit_budget(&mut self, max: u64) {
        self.rate_limit_budget = Some(max);
    }

    fn rate_limit_budget_spent(&self) -> bool {
        self.rate_limit_budget
            .map_or(false, |max| self.stats.rate_limit_hits >= max)
    }

    pub fn stats(&self) -> ClientStats {
        self.stats.clone()
    }

    /// Number of 429 responses seen since the client was created
    pub fn rate_limit_hits(&self) -> u64 {
        self.stats.rate_limit_hits
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    async fn authenticate(&mut self) -> Result<&str, ApiError> {
        let session = authenticate(&self.http, &self.auth_url, &self.credentials).await?;
        let session = self.session.insert(session);
        Ok(session.token())
    }

    /// Returns a usable token, refreshing it when it is about to expire
    async fn ensure_token(&mut self) -> Result<String, ApiError> {
        if let Some(session) = &self.session {
            if session.is_fresh(Instant::now()) {
                return Ok(session.token().to_string());
            }
            tracing::info!("Access token expired, refreshing...");
        }
        Ok(self.authenticate().await?.to_string())
    }

    async fn human_delay(&self) {
        let min = self.pacing.min_request_delay.max(0.0);
        let max = self.pacing.max_request_delay.max(min);
        let secs = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        if secs > 0.0 {
            tracing::debug!("Adding human-like delay: {:.2}s", secs);
            tokio::time::sleep(delay_from_secs(secs)).await;
        }
    }

    /// Sends a GET to `path` (relative to the API base) with full retry handling
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 429 | Sleep `Retry-After` (default 60 s), retry, no attempt used |
    /// | HTTP 401 | Re-authenticate, retry, no attempt used |
    /// | HTTP 3xx | Immediate → Redirect |
    /// | HTTP 404 | Immediate → NotFound |
    /// | HTTP 403 | Immediate → Forbidden |
    /// | HTTP 5xx | Backoff, retry up to `max-retries` attempts |
    /// | Transport error | Backoff, retry up to `max-retries` attempts |
    /// | Other 4xx | Immediate → `ApiError::Http` |
    pub async fn send(&mut self, path: &str) -> Result<Response, ApiError> {
        self.send_with_attempts(path, self.max_retries).await
    }

    async fn send_with_attempts(
        &mut self,
        path: &str,
        max_attempts: u32,
    ) -> Result<Response, ApiError> {
        let url = format!("{}{}", self.api_base, path);
        let mut backoff = Backoff::default();
        let mut attempts = 0u32;
        let mut free_retries = 0u32;

        loop {
            if free_retries > MAX_FREE_RETRIES {
                self.stats.failed_requests += 1;
                return Err(ApiError::Throttled {
                    retries: free_retries - 1,
                });
            }

            let token = self.ensure_token().await?;
            self.limiter.acquire().await;
            self.human_delay().await;

            tracing::debug!("GET {}", url);
            self.stats.total_requests += 1;

            let response = match self.http.get(&url).bearer_auth(&token).send().await {
                Ok(response) => response,
                Err(e) => {
                    self.stats.failed_requests += 1;
                    attempts += 1;
                    tracing::warn!(
                        "Request failed for {}: {} (attempt {}/{})",
                        path,
                        e,
                        attempts,
                        max_attempts
                    );
                    if attempts >= max_attempts {
                        return Err(ApiError::RetriesExhausted {
                            attempts,
                            last_error: e.to_string(),
                        });
                    }
                    backoff.wait().await;
                    continue;
                }
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = parse_retry_after(
                    response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok()),
                )
                .unwrap_or(DEFAULT_RETRY_AFTER);
                self.stats.rate_limit_hits += 1;
                free_retries += 1;
                if self.rate_limit_budget_spent() {
                    self.stats.failed_requests += 1;
                    tracing::warn!(
                        "Rate limit hit (429), {} in total, not retrying",
                        self.stats.rate_limit_hits
                    );
                    return Err(ApiError::Throttled {
                        retries: free_retries - 1,
                    });
                }
                tracing::warn!("Rate limit hit (429), waiting {:.0?}", retry_after);
                tokio::time::sleep(retry_after).await;
                continue;
            }

            if status == StatusCode::UNAUTHORIZED {
                tracing::info!("Token expired (401), re-authenticating...");
                self.session = None;
                free_retries += 1;
                continue;
            }

            if status.is_redirection() {
                tracing::debug!("Redirect ({}) for {} - likely doesn't exist", status, path);
                return Ok(Response::Redirect);
            }

            if status == StatusCode::NOT_FOUND {
                self.stats.failed_requests += 1;
                tracing::debug!("Not found (404): {}", path);
                return Ok(Response::NotFound);
            }

            if status == StatusCode::FORBIDDEN {
                self.stats.failed_requests += 1;
                tracing::debug!("Forbidden (403): {} - private, banned or throttled", path);
                return Ok(Response::Forbidden);
            }

            if status.is_server_error() {
                self.stats.failed_requests += 1;
                attempts += 1;
                tracing::warn!(
                    "Server error ({}) for {} (attempt {}/{})",
                    status.as_u16(),
                    path,
                    attempts,
                    max_attempts
                );
                if attempts >= max_attempts {
                    return Err(ApiError::RetriesExhausted {
                        attempts,
                        last_error: format!("HTTP {}", status.as_u16()),
                    });
                }
                backoff.wait().await;
                continue;
            }

            if !status.is_success() {
                self.stats.failed_requests += 1;
                tracing::error!("HTTP error ({}) for {}", status.as_u16(), path);
                return Err(ApiError::Http(status.as_u16()));
            }

            return match response.json::<Value>().await {
                Ok(body) => Ok(Response::Json(body)),
                Err(e) => {
                    self.stats.failed_requests += 1;
                    Err(ApiError::Decode(e.to_string()))
                }
            };
        }
    }

    /// Issues one request to a random unrelated endpoint
    ///
    /// Runs with the configured probability; failures are ignored.
    async fn maybe_cover_request(&mut self) {
        if !self.pacing.request_diversity {
            return;
        }

        let (roll, endpoint) = {
            let mut rng = rand::thread_rng();
            (rng.gen::<f64>(), COVER_ENDPOINTS.choose(&mut rng).copied())
        };
        if roll >= self.pacing.diversity_probability {
            return;
        }
        let Some(endpoint) = endpoint else {
            return;
        };

        match self.send_with_attempts(endpoint, 1).await {
            Ok(_) => {
                self.stats.diversity_requests += 1;
                tracing::debug!("Made diversity request to {}", endpoint);
            }
            Err(e) => tracing::debug!("Diversity request to {} failed: {}", endpoint, e),
        }
    }

    /// Fetches and classifies `/r/{name}/about`
    ///
    /// Never fails: unrecoverable errors become `Classification::Error`.
    pub async fn fetch_info(&mut self, name: &str) -> FetchOutcome {
        self.maybe_cover_request().await;

        let path = format!("/r/{}/about", name);
        match self.send(&path).await {
            Ok(Response::Json(payload)) => FetchOutcome::from_payload(name, &payload),
            Ok(Response::NotFound) | Ok(Response::Redirect) => {
                FetchOutcome::classified(name, Classification::NotFound)
            }
            Ok(Response::Forbidden) => FetchOutcome::classified(name, Classification::Deleted),
            Err(e) => {
                tracing::error!("Error fetching subreddit info for r/{}: {}", name, e);
                FetchOutcome::failed(name, e.to_string())
            }
        }
    }

    /// Collects post ids from a subreddit listing
    ///
    /// Follows `after` cursors 100 posts at a time until `limit` ids are
    /// collected, a page comes back empty, or there is no next cursor.
    /// `sort` is one of `hot`, `new`, `top`, `rising`; `top` spans all time.
    pub async fn fetch_listing_ids(
        &mut self,
        name: &str,
        sort: &str,
        limit: usize,
    ) -> Result<Vec<String>, ApiError> {
        let mut ids = Vec::new();
        let mut after: Option<String> = None;

        while ids.len() < limit {
            let page_size = LISTING_PAGE_SIZE.min(limit - ids.len());
            let mut path = format!("/r/{}/{}?limit={}", name, sort, page_size);
            if sort == "top" {
                path.push_str("&t=all");
            }
            if let Some(cursor) = &after {
                path.push_str("&after=");
                path.push_str(cursor);
            }

            let payload = match self.send(&path).await? {
                Response::Json(payload) => payload,
                other => {
                    tracing::debug!("Listing for r/{} ended with {:?}", name, other);
                    break;
                }
            };

            let data = &payload["data"];
            let children = data["children"].as_array().map(Vec::as_slice).unwrap_or(&[]);
            if children.is_empty() {
                break;
            }

            for child in children {
                if child["kind"] == "t3" {
                    if let Some(id) = child["data"]["id"].as_str() {
                        ids.push(id.to_string());
                        if ids.len() >= limit {
                            break;
                        }
                    }
                }
            }

            after = data["after"].as_str().map(str::to_string);
            if after.is_none() {
                break;
            }
        }

        tracing::debug!("Collected {} post ids from r/{}", ids.len(), name);
        Ok(ids)
    }
}
