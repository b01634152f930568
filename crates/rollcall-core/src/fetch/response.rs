use serde::{Deserialize, Serialize};

/// Body of the response synthesized when neither network nor cache can answer
pub const OFFLINE_BODY: &str = "Offline - Resource not cached";

/// Where a response came from, as far as cache admission is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin or fully readable response
    Basic,
    /// Response whose status and body are not inspectable
    Opaque,
    /// Network-level error surfaced as a response
    Error,
}

/// Fully buffered response: status line, headers and body.
///
/// A snapshot owns its body, so handing one copy to the cache and another to
/// the caller requires an explicit `clone()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    #[serde(skip)]
    pub body: Vec<u8>,
    pub kind: ResponseKind,
}

impl ResponseSnapshot {
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers: Vec::new(),
            body: body.into(),
            kind: ResponseKind::Basic,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_kind(mut self, kind: ResponseKind) -> Self {
        self.kind = kind;
        self
    }

    /// The 503 answer given when the network fails and nothing is cached.
    pub fn offline_fallback() -> Self {
        Self::new(503, "Service Unavailable", OFFLINE_BODY).with_header("Content-Type", "text/plain")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether this response may be admitted to the asset cache.
    /// Partial content (206) is a fragment and cannot be replayed as a whole.
    pub fn is_cacheable(&self) -> bool {
        self.kind == ResponseKind::Basic && self.is_success() && self.status != 206
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
