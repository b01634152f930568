use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fetch::ResponseSnapshot;

/// A value plus the moment it was written to the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    /// Human-readable age such as "just now", "5m ago", "3h ago" or "2d ago".
    /// Hours and days round half up.
    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        match minutes {
            // Negative ages come from clock skew
            m if m < 1 => "just now".to_string(),
            m if m < 60 => format!("{}m ago", m),
            m if m < 1440 => format!("{}h ago", (m + 30) / 60),
            m => format!("{}d ago", (m + 720) / 1440),
        }
    }
}

/// Metadata file contents for one cached request.
/// The body lives in the sibling file `body_file` and is attached on lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub method: String,
    pub url: String,
    pub body_file: String,
    pub response: ResponseSnapshot,
}
