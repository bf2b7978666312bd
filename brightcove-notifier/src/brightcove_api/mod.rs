//! Brightcove CMS API client and the payloads exchanged with it.
//!
//! Two kinds of data cross this boundary:
//!
//! - [`NotificationEvent`]s, which Brightcove pushes to our webhook when a video changes. They only
//!   identify the video; they carry none of its content.
//! - [`VideoRecord`]s, the authoritative video model that [`BrightcoveClient`] fetches from the
//!   CMS API in response to an event.

pub mod client;
pub mod events;
pub mod videos;

pub use client::{BrightcoveClient, FetchError, MAX_FETCH_ATTEMPTS};
pub use events::NotificationEvent;
pub use videos::VideoRecord;
