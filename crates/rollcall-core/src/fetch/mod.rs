//! Network access for the cache worker.
//!
//! `Fetch` is the seam every network call goes through. `HttpFetcher` is the
//! reqwest-backed implementation; tests substitute an in-memory stub.

pub mod client;
pub mod error;
pub mod request;
pub mod response;

#[cfg(test)]
pub(crate) mod stub;

pub use client::{Fetch, HttpFetcher};
pub use error::FetchError;
pub use request::{resolve_url, Request, RequestIdentity};
pub use response::{ResponseKind, ResponseSnapshot};
