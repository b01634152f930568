//! Core library for rollcall, an offline-first attendance tracker.
//!
//! The crate is split along the same seams the application runs on:
//!
//! - [`models`]: subjects, attendance records and the persisted dataset
//! - [`store`]: the local data store and the [`store::AttendanceBook`] that
//!   funnels every mutation through update-then-persist operations
//! - [`cache`]: versioned asset cache buckets on disk
//! - [`fetch`]: the network seam ([`fetch::Fetch`]) and its reqwest client
//! - [`policy`]: network-first request interception with cache fallback
//! - [`lifecycle`]: install / activate transitions of the cache generation
//! - [`control`]: the administrative message channel
//! - [`worker`]: wires the above into one running cache worker

pub mod cache;
pub mod config;
pub mod control;
pub mod fetch;
pub mod lifecycle;
pub mod models;
pub mod policy;
pub mod store;
pub mod worker;

pub use config::Config;
pub use worker::Worker;
