//! The Brightcove video model.

use serde_json::{Map, Value};

/// A video as returned by the Brightcove CMS API.
///
/// The upstream schema is large and not under our control, so the record is kept as an open JSON
/// object and forwarded as-is. The only field this service depends on is a string `id`.
pub type VideoRecord = Map<String, Value>;

/// Builds the record forwarded for a video that Brightcove reports as missing.
///
/// A 404 from the CMS API carries an array of error descriptors such as
/// `[{"error_code": "RESOURCE_NOT_FOUND", "message": "..."}]`. The first descriptor becomes the
/// record, tagged with the id of the video that was asked for, so downstream still learns about
/// the (now absent) video.
///
/// Returns `None` if the array is empty.
pub(crate) fn not_found_record(errors: Vec<VideoRecord>, video_id: &str) -> Option<VideoRecord> {
    let mut record = errors.into_iter().next()?;
    record.insert("id".to_string(), Value::String(video_id.to_string()));
    Some(record)
}
