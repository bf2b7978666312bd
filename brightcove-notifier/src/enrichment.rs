//! Adds the fields the publishing pipeline requires to a Brightcove video model.

use crate::brightcove_api::VideoRecord;
use serde_json::Value;
use uuid::Uuid;

/// Value of the `type` field on every forwarded record.
pub const VIDEO_TYPE: &str = "video";

/// The record has no usable `id`, so no identifier can be derived for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid content, missing video ID")]
pub struct MissingIdentifier;

/// Derives the publishing identifier for a Brightcove video id.
///
/// This is a name-based (v3, MD5) UUID under the nil namespace, so a given video always maps to
/// the same identifier no matter how many times it is republished.
pub fn derive_uuid(video_id: &str) -> Uuid {
    Uuid::new_v3(&Uuid::nil(), video_id.as_bytes())
}

/// Sets `uuid` and `type` on `record`, returning the derived identifier.
///
/// Fails if `id` is absent, not a string, or empty. The record is left untouched in that case.
pub fn enrich(record: &mut VideoRecord) -> Result<Uuid, MissingIdentifier> {
    let uuid = match record.get("id") {
        Some(Value::String(id)) if !id.is_empty() => derive_uuid(id),
        _ => return Err(MissingIdentifier),
    };
    record.insert("uuid".to_string(), Value::String(uuid.to_string()));
    record.insert("type".to_string(), Value::String(VIDEO_TYPE.to_string()));
    Ok(uuid)
}
