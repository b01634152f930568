use serde::{Deserialize, Serialize};

use super::{AttendanceRecord, Subject, UNKNOWN_SUBJECT};

/// The whole persisted document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub records: Vec<AttendanceRecord>,
}

impl Dataset {
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty() && self.records.is_empty()
    }

    pub fn subject(&self, id: i64) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.id == id)
    }

    /// Resolve a subject id to its name, falling back for deleted subjects.
    pub fn subject_name(&self, id: i64) -> &str {
        self.subject(id)
            .map(|s| s.name.as_str())
            .unwrap_or(UNKNOWN_SUBJECT)
    }

    /// Largest id in use, counting ids still referenced by records.
    pub fn max_known_id(&self) -> Option<i64> {
        self.subjects
            .iter()
            .map(|s| s.id)
            .chain(self.records.iter().map(|r| r.subject))
            .max()
    }

    /// Records sorted newest day first. Ties keep insertion order.
    pub fn history(&self) -> Vec<&AttendanceRecord> {
        let mut sorted: Vec<&AttendanceRecord> = self.records.iter().collect();
        sorted.sort_by(|a, b| b.date.cmp(&a.date));
        sorted
    }
}
