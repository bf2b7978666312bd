//! Authenticated access to the Brightcove CMS API.

use crate::brightcove_api::videos::{VideoRecord, not_found_record};
use crate::oauth::{RenewalError, TokenStore};
use eyre::Context;
use http::StatusCode;
use reqwest::Url;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::sync::Arc;
use tracing::instrument;

/// How many times a video fetch is attempted: the first try, plus one retry after renewing an
/// access token that the API rejected.
pub const MAX_FETCH_ATTEMPTS: u32 = 2;

/// Reasons fetching a video from Brightcove can fail.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The API rejected our token and obtaining a new one failed.
    #[error("renew access token")]
    AuthRenewalFailed(#[source] RenewalError),
    #[error("send request to Brightcove API: {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("parse Brightcove video response as JSON")]
    Decode(#[source] serde_json::Error),
    #[error("unexpected 404 response from Brightcove API: {0}")]
    MalformedNotFound(String),
    #[error("unexpected status code from Brightcove API: {0}")]
    UnexpectedStatus(StatusCode),
    /// The id cannot name a single video resource.
    #[error("invalid video id: {0:?}")]
    InvalidVideoId(String),
    #[error("invalid Brightcove API address {addr}: {reason}")]
    InvalidAddress { addr: String, reason: String },
}

/// Client for the Brightcove CMS API, scoped to a single account.
///
/// Requests carry the bearer token held in the shared [`TokenStore`]. When the API rejects the
/// token, the client renews it and tries again, at most [`MAX_FETCH_ATTEMPTS`] times in total.
#[derive(Debug, Clone)]
pub struct BrightcoveClient {
    http: reqwest::Client,
    /// Base address of the accounts resource, e.g. `https://cms.api.brightcove.com/v1/accounts/`.
    addr: String,
    account_id: String,
    tokens: Arc<TokenStore>,
}

impl BrightcoveClient {
    /// Creates a client for the videos of a single Brightcove account.
    ///
    /// No request is made until the first call, so an unreachable API or a bad `addr` only shows
    /// up then.
    ///
    /// # Arguments
    ///
    /// * `http` - Shared HTTP client, already configured with the outbound timeout
    /// * `addr` - Base address of the CMS API accounts resource, with or without a trailing `/`
    /// * `account_id` - The account whose videos are fetched, and whose events are accepted
    /// * `tokens` - Token store shared with every other user of the same credentials
    pub fn new(
        http: reqwest::Client,
        addr: impl Into<String>,
        account_id: impl Into<String>,
        tokens: Arc<TokenStore>,
    ) -> Self {
        Self {
            http,
            addr: addr.into(),
            account_id: account_id.into(),
            tokens,
        }
    }

    /// The account whose videos this client reads.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Returns the token store backing this client.
    ///
    /// The health probe renews tokens through it directly, bypassing [`Self::fetch_video`]'s retry.
    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Builds `{addr}/{account_id}/{segments...}`, percent-encoding each segment.
    fn account_url<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Url, FetchError> {
        let invalid = |reason: String| FetchError::InvalidAddress {
            addr: self.addr.clone(),
            reason,
        };
        let mut url = Url::parse(&self.addr).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("cannot be a base URL".to_string()))?
            .pop_if_empty()
            .push(&self.account_id)
            .extend(segments);
        Ok(url)
    }

    /// The video id arrives in untrusted webhook bodies, so it must stay a single path segment.
    fn video_url(&self, video_id: &str) -> Result<Url, FetchError> {
        if matches!(video_id, "" | "." | "..") {
            return Err(FetchError::InvalidVideoId(video_id.to_string()));
        }
        self.account_url(["videos", video_id])
    }

    fn video_count_url(&self) -> Result<Url, FetchError> {
        self.account_url(["counts", "videos"])
    }

    /// Sends a GET request carrying the current bearer token.
    async fn get_authenticated(&self, url: Url) -> Result<reqwest::Response, reqwest::Error> {
        let access_token = self.tokens.current().await;
        self.http
            .get(url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", access_token.secret()))
            .send()
            .await
    }

    /// Fetches the video model for `video_id`.
    ///
    /// A 401 triggers a single token renewal followed by one more attempt; if renewal fails, the
    /// fetch fails with [`FetchError::AuthRenewalFailed`] without retrying. A 404 is not an error:
    /// the first error descriptor Brightcove returns is turned into a record for the missing video
    /// so that downstream can still be told about it.
    #[instrument(skip(self), fields(account_id = %self.account_id))]
    pub async fn fetch_video(&self, video_id: &str, tid: &str) -> Result<VideoRecord, FetchError> {
        let url = self.video_url(video_id)?;

        let mut attempt = 1;
        loop {
            let response = self
                .get_authenticated(url.clone())
                .await
                .map_err(|source| FetchError::Transport {
                    url: url.to_string(),
                    source,
                })?;

            match response.status() {
                StatusCode::UNAUTHORIZED if attempt < MAX_FETCH_ATTEMPTS => {
                    tracing::info!(tid, "renewing access token");
                    self.tokens
                        .renew()
                        .await
                        .map_err(FetchError::AuthRenewalFailed)?;
                    attempt += 1;
                }
                StatusCode::NOT_FOUND => {
                    let body = response
                        .bytes()
                        .await
                        .map_err(|source| FetchError::Transport {
                            url: url.to_string(),
                            source,
                        })?;
                    let errors: Vec<VideoRecord> = serde_json::from_slice(&body)
                        .map_err(|e| FetchError::MalformedNotFound(e.to_string()))?;
                    tracing::debug!(tid, "video not found in Brightcove");
                    return not_found_record(errors, video_id).ok_or_else(|| {
                        FetchError::MalformedNotFound("zero-length array received".to_string())
                    });
                }
                StatusCode::OK => {
                    let body = response
                        .bytes()
                        .await
                        .map_err(|source| FetchError::Transport {
                            url: url.to_string(),
                            source,
                        })?;
                    return serde_json::from_slice(&body).map_err(FetchError::Decode);
                }
                status => return Err(FetchError::UnexpectedStatus(status)),
            }
        }
    }

    /// Asks the API how many videos the account holds and returns the response status.
    ///
    /// This is the cheapest authenticated call the CMS API offers, which makes it a good probe
    /// for reachability and token validity. The token is not renewed here; see
    /// [`crate::health::HealthProbe`].
    pub async fn video_count_status(&self) -> eyre::Result<StatusCode> {
        let url = self.video_count_url()?;
        let response = self
            .get_authenticated(url.clone())
            .await
            .with_context(|| format!("send request to Brightcove API: {url}"))?;
        Ok(response.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(addr: &str) -> BrightcoveClient {
        let http = reqwest::Client::new();
        let tokens = Arc::new(TokenStore::new(http.clone(), "http://localhost/token", ""));
        BrightcoveClient::new(http, addr, "775205503001", tokens)
    }

    #[test]
    fn test_video_url_appends_account_and_video() {
        let client = client("https://cms.api.brightcove.com/v1/accounts/");
        assert_eq!(
            client.video_url("4020894387001").unwrap().as_str(),
            "https://cms.api.brightcove.com/v1/accounts/775205503001/videos/4020894387001"
        );
    }

    #[test]
    fn test_video_id_stays_one_segment() {
        let client = client("https://cms.api.brightcove.com/v1/accounts/");
        assert_eq!(
            client.video_url("a/b?c#d").unwrap().as_str(),
            "https://cms.api.brightcove.com/v1/accounts/775205503001/videos/a%2Fb%3Fc%23d"
        );
        assert_eq!(
            client.video_url("../counts/videos").unwrap().as_str(),
            "https://cms.api.brightcove.com/v1/accounts/775205503001/videos/..%2Fcounts%2Fvideos"
        );
        for id in ["", ".", ".."] {
            assert!(
                matches!(client.video_url(id), Err(FetchError::InvalidVideoId(_))),
                "{id:?}"
            );
        }
    }

    #[test]
    fn test_address_without_trailing_slash() {
        let client = client("http://localhost:1234/accounts");
        assert_eq!(
            client.video_url("1").unwrap().as_str(),
            "http://localhost:1234/accounts/775205503001/videos/1"
        );
    }

    #[test]
    fn test_invalid_address() {
        let client = client("not a url");
        assert!(matches!(
            client.video_url("1"),
            Err(FetchError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_video_count_url() {
        let client = client("http://localhost:1234/accounts/");
        assert_eq!(
            client.video_count_url().unwrap().as_str(),
            "http://localhost:1234/accounts/775205503001/counts/videos"
        );
    }
}
