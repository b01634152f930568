use std::fmt;

use reqwest::{Method, Url};
use sha2::{Digest, Sha256};

use super::FetchError;

/// An outgoing request as seen by the interception policy.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn identity(&self) -> RequestIdentity {
        RequestIdentity {
            method: self.method.clone(),
            url: self.url.clone(),
        }
    }
}

/// Key a cached response is stored under: method plus absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestIdentity {
    pub method: Method,
    pub url: Url,
}

impl RequestIdentity {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
        }
    }

    /// Stable hex digest used to name the entry on disk.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_str().as_bytes());
        hasher.update(b" ");
        hasher.update(self.url.as_str().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Resolve a manifest or user-supplied URL against the application origin.
/// Absolute URLs (including `data:`) are kept as-is.
pub fn resolve_url(origin: &Url, raw: &str) -> Result<Url, FetchError> {
    Url::parse(raw)
        .or_else(|_| origin.join(raw))
        .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", raw, e)))
}
