//! HTTP API exposed by the thermal cameras.
//!
//! Routes (owned by the device firmware):
//!   GET    /api/recordings       → JSON array of recording ids
//!   GET    /api/recording/{id}   → raw recording bytes
//!   DELETE /api/recording/{id}   → remove the recording from the device

/// Listing endpoint.
pub const RECORDINGS_PATH: &str = "/api/recordings";

/// Path segments of the per-recording endpoint.  The id is appended as one
/// more segment and must be percent-encoded as such, since ids are opaque
/// and may contain `#`, `?` or `%`.
pub const RECORDING_SEGMENTS: [&str; 2] = ["api", "recording"];

/// URL of the listing endpoint for a device at `base_url`.
pub fn recordings_url(base_url: &str) -> String {
    format!("{base_url}{RECORDINGS_PATH}")
}
