//! Local persistence for the attendance dataset.
//!
//! `DataStore` owns the single JSON blob on disk. `AttendanceBook` holds the
//! in-memory copy and rewrites the blob after every mutation.

pub mod book;
pub mod local;

pub use book::{AttendanceBook, NewSubject};
pub use local::{DataStore, STORAGE_KEY};
