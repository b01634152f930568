//! Network-first request interception with cache fallback.
//!
//! For every GET request:
//!
//! 1. try the network
//! 2. on a cacheable response, store a clone in the current generation in
//!    the background and return the original
//! 3. on network failure, answer from the cache, or with a synthesized 503
//!
//! Non-GET requests are not intercepted at all.

use std::sync::Arc;

use reqwest::Method;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::debug;

use crate::cache::Generation;
use crate::fetch::{Fetch, Request, RequestIdentity, ResponseSnapshot};

/// What the policy decided to do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Not intercepted; the caller performs the request itself.
    Bypass,
    /// Answer produced by the policy.
    Respond(ResponseSnapshot),
}

pub struct InterceptionPolicy<F> {
    fetcher: Arc<F>,
    generation: Generation,
    pending: Mutex<JoinSet<()>>,
}

impl<F: Fetch> InterceptionPolicy<F> {
    pub fn new(fetcher: Arc<F>, generation: Generation) -> Self {
        Self {
            fetcher,
            generation,
            pending: Mutex::new(JoinSet::new()),
        }
    }

    pub fn generation(&self) -> &Generation {
        &self.generation
    }

    pub async fn handle(&self, request: &Request) -> Disposition {
        if request.method != Method::GET {
            return Disposition::Bypass;
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.store_in_background(request.identity(), response.clone()).await;
                }
                Disposition::Respond(response)
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Network failed, falling back to cache");
                Disposition::Respond(self.fallback(&request.identity()).await)
            }
        }
    }

    async fn fallback(&self, identity: &RequestIdentity) -> ResponseSnapshot {
        match self.generation.lookup(identity).await {
            Ok(Some(cached)) => {
                debug!(%identity, "Serving from cache");
                cached
            }
            Ok(None) => {
                debug!(%identity, "Not cached, answering offline");
                ResponseSnapshot::offline_fallback()
            }
            Err(e) => {
                debug!(%identity, error = %e, "Cache lookup failed, answering offline");
                ResponseSnapshot::offline_fallback()
            }
        }
    }

    async fn store_in_background(&self, identity: RequestIdentity, response: ResponseSnapshot) {
        let generation = self.generation.clone();
        let mut pending = self.pending.lock().await;
        // Reap finished writes so the set does not grow without bound
        while pending.try_join_next().is_some() {}
        pending.spawn(async move {
            if let Err(e) = generation.store(&identity, response).await {
                debug!(%identity, error = %e, "Dropping cache write");
            }
        });
    }

    /// Wait for every background cache write started so far.
    ///
    /// The set is taken out of the lock first so requests handled meanwhile
    /// can keep spawning writes.
    pub async fn settle(&self) {
        let mut started = std::mem::take(&mut *self.pending.lock().await);
        while started.join_next().await.is_some() {}
    }
}
