use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display name used for records whose subject has been deleted.
pub const UNKNOWN_SUBJECT: &str = "Unknown Subject";

/// Default accent color for new subjects
pub const DEFAULT_SUBJECT_COLOR: &str = "#6366f1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

impl Subject {
    /// Label used in pickers, e.g. "Physics (PHY101)"
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.code)
    }
}
