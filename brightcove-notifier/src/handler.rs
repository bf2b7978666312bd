//! The notification pipeline: decode, filter by account, fetch, enrich, forward.

use crate::brightcove_api::{BrightcoveClient, FetchError, NotificationEvent};
use crate::cms_notifier::{CmsNotifierClient, ForwardError};
use crate::enrichment::{self, MissingIdentifier};
use http::StatusCode;
use std::error::Error;
use uuid::Uuid;

/// A failure in one of the pipeline stages after the event was accepted.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("fetch video")]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Enrich(#[from] MissingIdentifier),
    #[error("forward video")]
    Forward(#[from] ForwardError),
}

impl PipelineError {
    /// The status reported back to whoever sent the notification.
    ///
    /// A video without an id is a problem with the content itself, so it is reported as a client
    /// error; everything else is on us or on one of our dependencies.
    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::Enrich(_) => StatusCode::BAD_REQUEST,
            PipelineError::Fetch(_) | PipelineError::Forward(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Why an inbound notification was dropped without doing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// The body was not a valid notification event.
    Undecodable,
    /// The event belongs to another Brightcove account.
    ForeignAccount(String),
}

/// What happened to an inbound notification that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The video was fetched, enriched with `uuid`, and accepted by the CMS notifier.
    Forwarded { uuid: Uuid },
    Dropped(DropReason),
}

/// Maps the outcome of a notification to the status code returned to its sender.
///
/// Dropped events get a plain 200, just like forwarded ones: the sender learns nothing about
/// events that we chose to ignore.
pub fn response_status(outcome: &Result<Delivery, PipelineError>) -> StatusCode {
    match outcome {
        Ok(_) => StatusCode::OK,
        Err(e) => e.status(),
    }
}

/// Relays Brightcove notifications for one account to the CMS notifier.
#[derive(Debug, Clone)]
pub struct Notifier {
    brightcove: BrightcoveClient,
    cms_notifier: CmsNotifierClient,
}

impl Notifier {
    /// Creates a notifier that accepts events for `brightcove`'s account only.
    pub fn new(brightcove: BrightcoveClient, cms_notifier: CmsNotifierClient) -> Self {
        Self {
            brightcove,
            cms_notifier,
        }
    }

    /// Handles the raw body of a Brightcove webhook call.
    ///
    /// Malformed events and events for other accounts are logged and dropped. Anything else runs
    /// through [`Self::relay`].
    #[tracing::instrument(skip(self, body))]
    pub async fn handle_notification(
        &self,
        body: &[u8],
        tid: &str,
    ) -> Result<Delivery, PipelineError> {
        let event = match NotificationEvent::from_slice(body) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(tid, error = %e, "invalid request received");
                return Ok(Delivery::Dropped(DropReason::Undecodable));
            }
        };

        if event.account_id != self.brightcove.account_id() {
            tracing::warn!(
                tid,
                account_id = %event.account_id,
                "notification event for unexpected account, ignoring"
            );
            return Ok(Delivery::Dropped(DropReason::ForeignAccount(
                event.account_id,
            )));
        }
        tracing::info!(tid, video_id = %event.video, "received notification event: {event}");

        self.relay(&event.video, tid).await
    }

    /// Re-delivers a video on operator request, skipping event decoding and account filtering.
    #[tracing::instrument(skip(self))]
    pub async fn handle_force_notification(
        &self,
        video_id: &str,
        tid: &str,
    ) -> Result<Delivery, PipelineError> {
        tracing::info!(tid, video_id, "received forced notification");
        self.relay(video_id, tid).await
    }

    /// Fetches `video_id` from Brightcove, enriches it, and forwards it to the CMS notifier.
    ///
    /// No stage is retried here; the only retry is the token renewal inside
    /// [`BrightcoveClient::fetch_video`].
    pub async fn relay(&self, video_id: &str, tid: &str) -> Result<Delivery, PipelineError> {
        let mut video = self
            .brightcove
            .fetch_video(video_id, tid)
            .await
            .inspect_err(|e| {
                tracing::warn!(tid, error = e as &(dyn Error + 'static), "fetching video failed")
            })?;
        tracing::info!(tid, video_id, "fetching video successful");

        let uuid = enrichment::enrich(&mut video)
            .inspect_err(|e| {
                tracing::warn!(
                    tid,
                    video_id,
                    error = e as &(dyn Error + 'static),
                    "enriching video failed"
                )
            })?;
        tracing::info!(tid, video_id, %uuid, "generated uuid for video");

        self.cms_notifier
            .forward(&video, tid)
            .await
            .inspect_err(|e| {
                tracing::warn!(tid, error = e as &(dyn Error + 'static), "forwarding video failed")
            })?;
        tracing::info!(tid, video_id, "forwarding video successful");

        Ok(Delivery::Forwarded { uuid })
    }
}
