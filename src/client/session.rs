//! OAuth token session
//!
//! Tokens come from the password grant and are treated as expired a fixed
//! margin before the declared expiry.

use crate::client::ApiError;
use crate::config::Credentials;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// How long before the declared expiry a token is refreshed
pub const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_EXPIRES_IN: u64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

/// A bearer token and the instant it stops being usable
#[derive(Clone)]
pub struct TokenSession {
    token: String,
    expires_at: Instant,
}

impl TokenSession {
    pub fn new(token: String, expires_in: Duration, now: Instant) -> Self {
        Self {
            token,
            expires_at: now + expires_in.saturating_sub(REFRESH_MARGIN),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

impl fmt::Debug for TokenSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSession")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Requests a new token with the password grant
///
/// # Arguments
///
/// * `http` - The HTTP client (carries the user agent)
/// * `auth_url` - The token endpoint
/// * `credentials` - Script-app id/secret and account login
///
/// # Returns
///
/// * `Ok(TokenSession)` - A fresh token
/// * `Err(ApiError::Auth)` - The endpoint refused the credentials
/// * `Err(ApiError::Transport)` - The endpoint could not be reached
pub async fn authenticate(
    http: &Client,
    auth_url: &str,
    credentials: &Credentials,
) -> Result<TokenSession, ApiError> {
    let response = http
        .post(auth_url)
        .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
        .form(&[
            ("grant_type", "password"),
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::Auth(format!(
            "token endpoint returned HTTP {}",
            status.as_u16()
        )));
    }

    let body: TokenResponse = response
        .json()
        .await
        .map_err(|e| ApiError::Decode(format!("token response: {}", e)))?;

    // Bad logins come back as 200 with an error field
    if let Some(error) = body.error {
        return Err(ApiError::Auth(error));
    }

    let token = body
        .access_token
        .ok_or_else(|| ApiError::Auth("token response without access_token".to_string()))?;
    let expires_in = body.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);

    tracing::debug!(
        "Reddit authentication successful, token expires in {}s",
        expires_in
    );

    Ok(TokenSession::new(
        token,
        Duration::from_secs(expires_in),
        Instant::now(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> Credentials {
        Credentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            username: "bot".to_string(),
            password: "hunter2".to_string(),
        }
    }

    #[test]
    fn test_session_refreshes_before_expiry() {
        let now = Instant::now();
        let session = TokenSession::new("t".to_string(), Duration::from_secs(3600), now);

        assert!(session.is_fresh(now + Duration::from_secs(3539)));
        assert!(!session.is_fresh(now + Duration::from_secs(3540)));
    }

    #[test]
    fn test_short_lived_token_is_stale_immediately() {
        let now = Instant::now();
        let session = TokenSession::new("t".to_string(), Duration::from_secs(30), now);
        assert!(!session.is_fresh(now));
    }

    #[test]
    fn test_debug_redacts_token() {
        let session = TokenSession::new(
            "very-secret".to_string(),
            Duration::from_secs(3600),
            Instant::now(),
        );
        assert!(!format!("{:?}", session).contains("very-secret"));
    }

    #[tokio::test]
    async fn test_authenticate_password_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .and(header_exists("authorization"))
            .and(body_string_contains("grant_type=password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "abc",
                "token_type": "bearer",
                "expires_in": 86400
            })))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/api/v1/access_token", server.uri());
        let session = authenticate(&Client::new(), &url, &credentials())
            .await
            .unwrap();

        assert_eq!(session.token(), "abc");
        assert!(session.is_fresh(Instant::now()));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "error": "invalid_grant" })),
            )
            .mount(&server)
            .await;

        let result = authenticate(&Client::new(), &server.uri(), &credentials()).await;
        assert!(matches!(result, Err(ApiError::Auth(msg)) if msg == "invalid_grant"));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = authenticate(&Client::new(), &server.uri(), &credentials()).await;
        assert!(matches!(result, Err(ApiError::Auth(_))));
    }
}
