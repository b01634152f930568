//! Versioned asset cache for offline access to the application shell.
//!
//! This module provides the `AssetCache` for storing request/response pairs
//! on disk. Each deployed version owns one bucket (a `Generation`) named by
//! its version tag:
//!
//! ```text
//! <cache_dir>/<tag>/<sha256>.json            entry metadata, wrapped in CachedData
//! <cache_dir>/<tag>/<sha256>-<pid>-<n>.body   raw response body named by the metadata
//! ```
//!
//! A body is written under a fresh name before its metadata is renamed into
//! place, so the metadata rename publishes the whole entry at once.
//!
//! Only the current generation is expected to survive activation.

pub mod entry;
pub mod error;
pub mod manager;

pub use entry::{CachedData, StoredEntry};
pub use error::CacheError;
pub use manager::{AssetCache, Generation, PopulateReport};
