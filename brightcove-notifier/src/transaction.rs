//! Transaction ids, which tie together the log lines of one notification across services.

use http::HeaderMap;
use uuid::Uuid;

/// Header carrying the transaction id across service boundaries.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Returns the transaction id of an inbound request, minting a new one if the caller sent none.
pub fn from_headers(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(new_transaction_id)
}

pub fn new_transaction_id() -> String {
    format!("tid_{}", Uuid::new_v4().simple())
}
