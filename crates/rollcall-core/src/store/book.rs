//! The in-memory attendance dataset and its named mutations.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

use super::DataStore;
use crate::models::subject::DEFAULT_SUBJECT_COLOR;
use crate::models::{AttendanceRecord, AttendanceStatus, Dataset, Subject};

/// Input for [`AttendanceBook::add_subject`].
#[derive(Debug, Clone, Default)]
pub struct NewSubject {
    pub name: String,
    pub code: Option<String>,
    pub color: Option<String>,
}

impl NewSubject {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Single writable copy of the dataset.
///
/// Every mutation is applied to a copy of the dataset, flushed through the
/// [`DataStore`], and only then becomes the in-memory state. A failed save
/// leaves memory matching what is on disk.
pub struct AttendanceBook {
    store: DataStore,
    data: Dataset,
}

impl AttendanceBook {
    /// Load the dataset from `store`, starting empty if nothing usable is there.
    pub fn open(store: DataStore) -> Self {
        let data = store.load();
        debug!(
            subjects = data.subjects.len(),
            records = data.records.len(),
            "Loaded attendance dataset"
        );
        Self { store, data }
    }

    pub fn data(&self) -> &Dataset {
        &self.data
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    /// Save `next` and adopt it as the current dataset.
    fn commit(&mut self, next: Dataset) -> Result<()> {
        self.store.save(&next)?;
        self.data = next;
        Ok(())
    }

    pub fn add_subject(&mut self, new: NewSubject) -> Result<Subject> {
        self.add_subject_at(new, Utc::now())
    }

    /// Create a subject. The id is derived from `now` in epoch milliseconds
    /// and bumped past every id already in use, so ids are never reused.
    pub fn add_subject_at(&mut self, new: NewSubject, now: DateTime<Utc>) -> Result<Subject> {
        let name = new.name.trim();
        if name.is_empty() {
            bail!("Subject name cannot be empty");
        }

        let code = new
            .code
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| name.to_string());

        let color = new
            .color
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SUBJECT_COLOR.to_string());

        let mut id = now.timestamp_millis();
        if let Some(max) = self.data.max_known_id() {
            let Some(next) = max.checked_add(1) else {
                bail!("Subject id space exhausted");
            };
            id = id.max(next);
        }

        let subject = Subject {
            id,
            name: name.to_string(),
            code,
            color,
            created_at: now,
        };
        let mut next = self.data.clone();
        next.subjects.push(subject.clone());
        self.commit(next)?;

        info!(id = subject.id, name = %subject.name, "Added subject");
        Ok(subject)
    }

    /// Remove a subject. Records that reference it are left untouched.
    pub fn delete_subject(&mut self, id: i64) -> Result<bool> {
        if self.data.subject(id).is_none() {
            return Ok(false);
        }
        let mut next = self.data.clone();
        next.subjects.retain(|s| s.id != id);
        self.commit(next)?;
        info!(id, "Deleted subject");
        Ok(true)
    }

    pub fn record_attendance(&mut self, subject: i64, status: AttendanceStatus) -> Result<AttendanceRecord> {
        self.record_attendance_at(subject, status, Utc::now())
    }

    /// Mark `subject` for the UTC day of `at`.
    ///
    /// Marking the same subject twice on one day overwrites the earlier
    /// status and timestamp.
    pub fn record_attendance_at(
        &mut self,
        subject: i64,
        status: AttendanceStatus,
        at: DateTime<Utc>,
    ) -> Result<AttendanceRecord> {
        if self.data.subject(subject).is_none() {
            return Err(anyhow!("Subject {} not found", subject));
        }

        let date = at.date_naive();
        let mut next = self.data.clone();
        let record = match next
            .records
            .iter_mut()
            .find(|r| r.key() == (date, subject))
        {
            Some(existing) => {
                existing.status = status;
                existing.timestamp = at;
                existing.clone()
            }
            None => {
                let record = AttendanceRecord {
                    date,
                    subject,
                    status,
                    timestamp: at,
                };
                next.records.push(record.clone());
                record
            }
        };
        self.commit(next)?;

        debug!(subject, %date, %status, "Recorded attendance");
        Ok(record)
    }

    /// Drop every attendance record, keeping subjects.
    pub fn clear_history(&mut self) -> Result<()> {
        let next = Dataset {
            subjects: self.data.subjects.clone(),
            records: Vec::new(),
        };
        self.commit(next)?;
        info!("Cleared attendance history");
        Ok(())
    }

    /// Drop all subjects and records.
    pub fn clear_all(&mut self) -> Result<()> {
        self.commit(Dataset::default())?;
        info!("Cleared all data");
        Ok(())
    }

    /// File name offered for a data export made on `date`.
    pub fn export_file_name(date: NaiveDate) -> String {
        format!("attendance-{}.json", date.format("%Y-%m-%d"))
    }

    /// Write the dataset verbatim into `dir` as a dated JSON file.
    pub fn export_to(&self, dir: &Path, date: NaiveDate) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create export directory {}", dir.display()))?;
        let path = dir.join(Self::export_file_name(date));
        let contents = serde_json::to_string_pretty(&self.data)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write export {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn book() -> (tempfile::TempDir, AttendanceBook) {
        let dir = tempfile::tempdir().unwrap();
        let book = AttendanceBook::open(DataStore::new(dir.path()));
        (dir, book)
    }

    #[test]
    fn test_add_subject_defaults_and_persists() {
        let (_dir, mut book) = book();
        let subject = book.add_subject(NewSubject::named("  Biology ")).unwrap();

        assert_eq!(subject.name, "Biology");
        assert_eq!(subject.code, "Biology");
        assert_eq!(subject.color, DEFAULT_SUBJECT_COLOR);
        assert_eq!(book.store().load().subjects, vec![subject]);
    }

    #[test]
    fn test_add_subject_rejects_blank_name() {
        let (_dir, mut book) = book();
        assert!(book.add_subject(NewSubject::named("   ")).is_err());
        assert!(book.data().subjects.is_empty());
    }

    #[test]
    fn test_subject_ids_are_unique_within_same_millisecond() {
        let (_dir, mut book) = book();
        let now = Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap();
        let a = book.add_subject_at(NewSubject::named("A"), now).unwrap();
        let b = book.add_subject_at(NewSubject::named("B"), now).unwrap();
        assert_ne!(a.id, b.id);
        assert!(b.id > a.id);
    }

    #[test]
    fn test_deleted_subject_id_is_not_reused() {
        let (_dir, mut book) = book();
        let now = Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap();
        let a = book.add_subject_at(NewSubject::named("A"), now).unwrap();
        book.record_attendance_at(a.id, AttendanceStatus::Present, now).unwrap();
        book.delete_subject(a.id).unwrap();

        let b = book.add_subject_at(NewSubject::named("B"), now).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_marking_twice_same_day_overwrites() {
        let (_dir, mut book) = book();
        let morning = Utc.with_ymd_and_hms(2024, 9, 2, 8, 0, 0).unwrap();
        let evening = morning + Duration::hours(9);
        let subject = book.add_subject_at(NewSubject::named("History"), morning).unwrap();

        book.record_attendance_at(subject.id, AttendanceStatus::Present, morning).unwrap();
        book.record_attendance_at(subject.id, AttendanceStatus::Absent, evening).unwrap();

        let records = &book.store().load().records;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, AttendanceStatus::Absent);
        assert_eq!(records[0].timestamp, evening);
    }

    #[test]
    fn test_marking_different_days_adds_records() {
        let (_dir, mut book) = book();
        let day1 = Utc.with_ymd_and_hms(2024, 9, 2, 8, 0, 0).unwrap();
        let subject = book.add_subject_at(NewSubject::named("Art"), day1).unwrap();

        book.record_attendance_at(subject.id, AttendanceStatus::Present, day1).unwrap();
        book.record_attendance_at(subject.id, AttendanceStatus::Present, day1 + Duration::days(1)).unwrap();
        assert_eq!(book.data().records.len(), 2);
    }

    #[test]
    fn test_record_attendance_unknown_subject_fails() {
        let (_dir, mut book) = book();
        assert!(book.record_attendance(42, AttendanceStatus::Present).is_err());
        assert!(book.data().records.is_empty());
    }

    #[test]
    fn test_delete_subject_keeps_records() {
        let (_dir, mut book) = book();
        let subject = book.add_subject(NewSubject::named("Music")).unwrap();
        let record = book.record_attendance(subject.id, AttendanceStatus::Present).unwrap();

        assert!(book.delete_subject(subject.id).unwrap());
        assert!(!book.delete_subject(subject.id).unwrap());

        let persisted = book.store().load();
        assert!(persisted.subjects.is_empty());
        assert_eq!(persisted.records, vec![record]);
        assert_eq!(persisted.subject_name(subject.id), crate::models::UNKNOWN_SUBJECT);
    }

    #[test]
    fn test_clear_history_and_clear_all() {
        let (_dir, mut book) = book();
        let subject = book.add_subject(NewSubject::named("Music")).unwrap();
        book.record_attendance(subject.id, AttendanceStatus::Absent).unwrap();

        book.clear_history().unwrap();
        let persisted = book.store().load();
        assert!(persisted.records.is_empty());
        assert_eq!(persisted.subjects.len(), 1);

        book.clear_all().unwrap();
        assert!(book.store().load().is_empty());
    }

    #[test]
    fn test_reopen_sees_persisted_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = AttendanceBook::open(DataStore::new(dir.path()));
        let subject = book.add_subject(NewSubject::named("Latin")).unwrap();

        let reopened = AttendanceBook::open(DataStore::new(dir.path()));
        assert_eq!(reopened.data().subjects, vec![subject]);
    }

    #[test]
    fn test_add_subject_fails_when_ids_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::new(dir.path());
        let now = Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap();
        store
            .save(&Dataset {
                subjects: Vec::new(),
                records: vec![AttendanceRecord {
                    date: now.date_naive(),
                    subject: i64::MAX,
                    status: AttendanceStatus::Present,
                    timestamp: now,
                }],
            })
            .unwrap();

        let mut book = AttendanceBook::open(store);
        assert!(book.add_subject_at(NewSubject::named("Overflow"), now).is_err());
        assert!(book.data().subjects.is_empty());
    }

    #[test]
    fn test_failed_save_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = AttendanceBook::open(DataStore::new(dir.path()));
        let subject = book.add_subject(NewSubject::named("Physics")).unwrap();
        book.record_attendance(subject.id, AttendanceStatus::Present).unwrap();
        let before = book.data().clone();

        // A regular file where the data directory should be makes every save fail
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let mut book = AttendanceBook {
            store: DataStore::new(blocker.join("data")),
            data: before.clone(),
        };

        assert!(book.add_subject(NewSubject::named("Ghost")).is_err());
        assert!(book.record_attendance(subject.id, AttendanceStatus::Absent).is_err());
        assert!(book.delete_subject(subject.id).is_err());
        assert!(book.clear_history().is_err());
        assert!(book.clear_all().is_err());
        assert_eq!(book.data(), &before);
    }

    #[test]
    fn test_export_writes_dated_file() {
        let (dir, mut book) = book();
        book.add_subject(NewSubject::named("Drama")).unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();
        let path = book.export_to(&dir.path().join("exports"), date).unwrap();
        assert!(path.ends_with("attendance-2024-10-01.json"));

        let exported: Dataset = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(&exported, book.data());
    }
}
