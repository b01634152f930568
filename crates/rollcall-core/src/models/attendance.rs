use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    /// Parse a status from user input ("present", "p", "absent", "a").
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "present" | "p" => Some(AttendanceStatus::Present),
            "absent" | "a" => Some(AttendanceStatus::Absent),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "✓ Present",
            AttendanceStatus::Absent => "✗ Absent",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttendanceStatus::Present => write!(f, "present"),
            AttendanceStatus::Absent => write!(f, "absent"),
        }
    }
}

/// One attendance mark. Unique by `(date, subject)`.
///
/// `subject` is a plain id and may outlive the subject it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub date: NaiveDate,
    pub subject: i64,
    pub status: AttendanceStatus,
    pub timestamp: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn key(&self) -> (NaiveDate, i64) {
        (self.date, self.subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(AttendanceStatus::parse("present"), Some(AttendanceStatus::Present));
        assert_eq!(AttendanceStatus::parse(" ABSENT "), Some(AttendanceStatus::Absent));
        assert_eq!(AttendanceStatus::parse("p"), Some(AttendanceStatus::Present));
        assert_eq!(AttendanceStatus::parse("late"), None);
    }

    #[test]
    fn test_record_wire_format() {
        let json = r#"{"date":"2024-03-04","status":"present","subject":1709546400000,"timestamp":"2024-03-04T10:15:00.000Z"}"#;
        let record: AttendanceRecord = serde_json::from_str(json).expect("Failed to parse record JSON");
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(record.status, AttendanceStatus::Present);

        let out = serde_json::to_value(&record).unwrap();
        assert_eq!(out["date"], "2024-03-04");
        assert_eq!(out["status"], "present");
    }

    #[test]
    fn test_record_rejects_loose_subject_id() {
        // Subject ids are strictly numeric
        let json = r#"{"date":"2024-03-04","status":"present","subject":"1709546400000","timestamp":"2024-03-04T10:15:00Z"}"#;
        assert!(serde_json::from_str::<AttendanceRecord>(json).is_err());
    }
}
