//! Webhook events pushed by Brightcove.

use serde::Deserialize;
use std::fmt;

/// A video change notification as posted by Brightcove to `/notify`.
///
/// Fields missing from the payload take their default values; only syntactically invalid JSON (or
/// a field of the wrong type) fails to decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NotificationEvent {
    /// When the change happened, in milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// The Brightcove account the video belongs to.
    pub account_id: String,
    /// The kind of change, e.g. `video-change`. Informational only.
    pub event: String,
    /// The id of the video that changed.
    pub video: String,
    pub version: i64,
}

impl NotificationEvent {
    /// Decodes an event from a raw request body.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "video event: timestamp [")?;
        match jiff::Timestamp::from_millisecond(self.timestamp) {
            Ok(ts) => write!(f, "{ts}")?,
            Err(_) => write!(f, "{}", self.timestamp)?,
        }
        write!(
            f,
            "], account [{}], event [{}], video [{}], version [{}]",
            self.account_id, self.event, self.video, self.version
        )
    }
}
