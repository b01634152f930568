//! In-memory fetcher for tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{Fetch, FetchError, Request, ResponseSnapshot};

/// Serves canned responses by URL. Unknown URLs answer 404; URLs marked
/// unreachable, or every URL while offline, fail like a dropped connection.
#[derive(Default)]
pub struct StubFetcher {
    routes: Mutex<HashMap<String, ResponseSnapshot>>,
    unreachable: Mutex<HashSet<String>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, url: &str, response: ResponseSnapshot) -> Self {
        self.set_route(url, response);
        self
    }

    pub fn set_route(&self, url: &str, response: ResponseSnapshot) {
        self.routes.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn unreachable(self, url: &str) -> Self {
        self.unreachable.lock().unwrap().insert(url.to_string());
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetch for StubFetcher {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let url = request.url.as_str();

        if self.offline.load(Ordering::SeqCst) || self.unreachable.lock().unwrap().contains(url) {
            return Err(FetchError::Unreachable(url.to_string()));
        }

        let routed = self.routes.lock().unwrap().get(url).cloned();
        Ok(routed.unwrap_or_else(|| ResponseSnapshot::new(404, "Not Found", "not found")))
    }
}
