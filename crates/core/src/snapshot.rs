//! Captured response snapshots.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// An immutable captured copy of a response, suitable for storage and
/// later replay.
///
/// The body is refcounted: cloning a snapshot is cheap and never re-reads
/// a network stream. The transport materializes each network body into
/// `Bytes` exactly once, so a snapshot can be stored and returned
/// independently without the single-read hazard of a live response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// HTTP status code.
    pub status: u16,
    /// Header name/value pairs in response order.
    pub headers: Vec<(String, String)>,
    /// Response body bytes.
    pub body: Bytes,
}

impl Snapshot {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self { status, headers, body: body.into() }
    }

    /// Whether the status reports success (2xx).
    pub fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// First value of the named header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The synthesized response returned when neither the network nor the
    /// store can produce anything for a request.
    pub fn unavailable() -> Self {
        Self {
            status: 503,
            headers: vec![(
                "content-type".to_string(),
                "text/plain; charset=utf-8".to_string(),
            )],
            body: Bytes::from_static(b"offline: resource unavailable"),
        }
    }
}
