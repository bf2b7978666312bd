//! OAuth 2.0 access token management for the Brightcove API.
//!
//! Brightcove issues short-lived bearer tokens through a client-credentials grant. We do not track
//! token expiry; instead an expired token is discovered when the API answers with a 401, at which
//! point the caller asks the [`TokenStore`] to [renew](TokenStore::renew) it.

use http::StatusCode;
use oauth2::AccessToken;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use std::fmt;
use tokio::sync::RwLock;

/// Grant type requested from the Brightcove OAuth token endpoint.
const CLIENT_CREDENTIALS: &str = "client_credentials";

/// Reasons a token renewal can fail.
///
/// Each cause is kept distinct so that logs tell an unreachable OAuth endpoint apart from one that
/// rejected our credentials or handed back an unusable token.
#[derive(Debug, thiserror::Error)]
pub enum RenewalError {
    #[error("send token request to {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("token endpoint responded with status {0}")]
    Status(StatusCode),
    #[error("parse token endpoint response as JSON")]
    Decode(#[source] serde_json::Error),
    #[error("token endpoint response has no access_token field")]
    MissingToken,
    #[error("token endpoint returned an empty access token")]
    EmptyToken,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: Option<AccessToken>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Holds the current Brightcove bearer token and knows how to obtain a new one.
///
/// The store is shared between every in-flight request. Reads clone the current token and writes
/// replace it wholesale, so a reader never observes a half-written value. Concurrent renewals are
/// not coalesced: each one asks the OAuth endpoint for a fresh token and the last writer wins. A
/// request that read a token just before it was replaced will simply see another 401 and renew
/// again.
pub struct TokenStore {
    token: RwLock<AccessToken>,
    oauth_addr: String,
    /// Pre-shared `Authorization` header value, e.g. `Basic <base64(client_id:client_secret)>`.
    authorization: String,
    http: reqwest::Client,
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore")
            .field("oauth_addr", &self.oauth_addr)
            .finish_non_exhaustive()
    }
}

impl TokenStore {
    /// Creates a store with no token yet.
    ///
    /// The first API call will be rejected with a 401, which triggers the initial renewal.
    pub fn new(
        http: reqwest::Client,
        oauth_addr: impl Into<String>,
        authorization: impl Into<String>,
    ) -> Self {
        Self {
            token: RwLock::new(AccessToken::new(String::new())),
            oauth_addr: oauth_addr.into(),
            authorization: authorization.into(),
            http,
        }
    }

    /// Seeds the store with an already-issued token.
    pub fn with_token(self, token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(AccessToken::new(token.into())),
            ..self
        }
    }

    /// Returns a copy of the current token.
    pub async fn current(&self) -> AccessToken {
        self.token.read().await.clone()
    }

    /// Replaces the current token.
    pub async fn replace(&self, token: AccessToken) {
        *self.token.write().await = token;
    }

    /// Requests a new access token from the OAuth endpoint and stores it.
    ///
    /// The stored token is only touched if the endpoint returns 200 with a non-empty
    /// `access_token`; on any failure the previous token is left in place.
    #[tracing::instrument(skip(self), fields(oauth_addr = %self.oauth_addr), err)]
    pub async fn renew(&self) -> Result<(), RenewalError> {
        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", CLIENT_CREDENTIALS)
            .finish();

        let response = self
            .http
            .post(&self.oauth_addr)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(AUTHORIZATION, &self.authorization)
            .body(body)
            .send()
            .await
            .map_err(|source| RenewalError::Transport {
                url: self.oauth_addr.clone(),
                source,
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(RenewalError::Status(status));
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| RenewalError::Transport {
                url: self.oauth_addr.clone(),
                source,
            })?;
        let token: AccessTokenResponse =
            serde_json::from_slice(&body).map_err(RenewalError::Decode)?;

        let Some(access_token) = token.access_token else {
            return Err(RenewalError::MissingToken);
        };
        if access_token.secret().is_empty() {
            return Err(RenewalError::EmptyToken);
        }

        tracing::debug!(
            token_type = token.token_type.as_deref().unwrap_or("unknown"),
            expires_in = token.expires_in,
            "renewed access token"
        );
        self.replace(access_token).await;
        Ok(())
    }
}
