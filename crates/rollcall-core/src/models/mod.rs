//! Data models for the attendance dataset.
//!
//! - `Subject`: a user-defined course or class attendance is tracked against
//! - `AttendanceRecord`, `AttendanceStatus`: one mark per subject per day
//! - `Dataset`: the whole persisted document `{ subjects, records }`

pub mod attendance;
pub mod dataset;
pub mod subject;

pub use attendance::{AttendanceRecord, AttendanceStatus};
pub use dataset::Dataset;
pub use subject::{Subject, UNKNOWN_SUBJECT};
