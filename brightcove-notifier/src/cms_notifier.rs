//! Client for the CMS notifier, the entry point of the publishing pipeline.

use crate::brightcove_api::VideoRecord;
use crate::transaction::REQUEST_ID_HEADER;
use eyre::Context;
use http::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HOST};
use std::fmt;
use tracing::instrument;

/// Header identifying which source system a publish event comes from.
pub const ORIGIN_SYSTEM_HEADER: &str = "X-Origin-System-Id";

/// Our value for [`ORIGIN_SYSTEM_HEADER`].
pub const ORIGIN_SYSTEM_ID: &str = "brightcove";

/// Reasons forwarding a video to the CMS notifier can fail.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("serialize video record")]
    Encode(#[source] serde_json::Error),
    #[error("send request to CMS notifier: {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The notifier refused the payload. The response body usually says why.
    #[error("CMS notifier rejected the payload with status 400: {0}")]
    RejectedPayload(String),
    #[error("unexpected status code from CMS notifier: {0}")]
    UnexpectedStatus(StatusCode),
}

/// Client for the CMS notifier's `/notify` and `/__health` endpoints.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct CmsNotifierClient {
    http: reqwest::Client,
    addr: String,
    /// Static `Authorization` header value.
    authorization: String,
    /// Overrides the `Host` header on health checks, for notifiers behind a shared router.
    host_header: Option<String>,
}

impl fmt::Debug for CmsNotifierClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CmsNotifierClient")
            .field("addr", &self.addr)
            .field("host_header", &self.host_header)
            .finish_non_exhaustive()
    }
}

impl CmsNotifierClient {
    /// Creates a client for the CMS notifier at `addr`.
    ///
    /// # Arguments
    ///
    /// * `http` - Shared HTTP client, already configured with the outbound timeout
    /// * `addr` - Base address of the notifier, without a trailing `/`, e.g. `http://localhost:13080`
    /// * `authorization` - Value sent verbatim as the `Authorization` header on every request
    pub fn new(
        http: reqwest::Client,
        addr: impl Into<String>,
        authorization: impl Into<String>,
    ) -> Self {
        Self {
            http,
            addr: addr.into(),
            authorization: authorization.into(),
            host_header: None,
        }
    }

    /// Sets the `Host` header sent on health checks.
    ///
    /// `None` or an empty value leaves the header to be derived from `addr`.
    pub fn with_host_header(mut self, host: Option<String>) -> Self {
        self.host_header = host.filter(|h| !h.is_empty());
        self
    }

    /// Posts `video` to the notifier's `/notify` endpoint.
    ///
    /// Every request carries the origin system id and the transaction id `tid`. There is no retry
    /// here: a failed forward is reported to the caller and the event is not re-sent.
    #[instrument(skip(self, video), fields(video_id = ?video.get("id")))]
    pub async fn forward(&self, video: &VideoRecord, tid: &str) -> Result<(), ForwardError> {
        let body = serde_json::to_vec(video).map_err(ForwardError::Encode)?;
        let url = format!("{}/notify", self.addr);

        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(ORIGIN_SYSTEM_HEADER, ORIGIN_SYSTEM_ID)
            .header(REQUEST_ID_HEADER, tid)
            .header(AUTHORIZATION, &self.authorization)
            .body(body)
            .send()
            .await
            .map_err(|source| ForwardError::Transport {
                url: url.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::BAD_REQUEST => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                Err(ForwardError::RejectedPayload(message))
            }
            status => Err(ForwardError::UnexpectedStatus(status)),
        }
    }

    /// Checks that the notifier's own health endpoint answers with 200.
    pub async fn check_health(&self) -> eyre::Result<()> {
        let url = format!("{}/__health", self.addr);
        let mut request = self
            .http
            .get(&url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, &self.authorization);
        if let Some(host) = &self.host_header {
            request = request.header(HOST, host);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("send request to CMS notifier: {url}"))?;

        let status = response.status();
        if status != StatusCode::OK {
            eyre::bail!("unhealthy status code received: {status}");
        }
        Ok(())
    }
}
