//! The running cache worker: lifecycle, interception policy and control
//! channel for one deployed version.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::info;

use crate::cache::AssetCache;
use crate::control::{ControlChannel, ControlHandle, ControlMessage, ControlReply};
use crate::fetch::{Fetch, FetchError, Request, ResponseSnapshot};
use crate::lifecycle::{ActivateOutcome, InstallOutcome, LifecycleConfig, LifecycleController, LifecycleError};
use crate::policy::{Disposition, InterceptionPolicy};

/// Events the worker reacts to once it is running.
pub enum WorkerEvent {
    Fetch {
        request: Request,
        reply: oneshot::Sender<Result<ResponseSnapshot, FetchError>>,
    },
    Message {
        message: ControlMessage,
        reply: Option<oneshot::Sender<ControlReply>>,
    },
}

/// Result of bringing a worker up.
#[derive(Debug, Clone)]
pub struct Startup {
    pub install: InstallOutcome,
    pub activate: ActivateOutcome,
}

pub struct Worker<F> {
    lifecycle: LifecycleController<F>,
    policy: InterceptionPolicy<F>,
    control: ControlHandle,
    fetcher: Arc<F>,
}

impl<F: Fetch> Worker<F> {
    /// Install and activate `config.version`, then enter steady state.
    pub async fn start(config: LifecycleConfig, cache: AssetCache, fetcher: Arc<F>) -> Result<(Self, Startup), LifecycleError> {
        let mut lifecycle = LifecycleController::new(config, cache.clone(), fetcher.clone());

        let install = lifecycle.install().await?;
        let activate = lifecycle.activate().await?;

        let worker = Self::steady_state(lifecycle, cache, fetcher)?;
        Ok((worker, Startup { install, activate }))
    }

    /// Re-enter steady state for a version activated by an earlier run.
    pub async fn resume(config: LifecycleConfig, cache: AssetCache, fetcher: Arc<F>) -> Result<Self, LifecycleError> {
        let lifecycle = LifecycleController::resume(config, cache.clone(), fetcher.clone()).await?;
        Self::steady_state(lifecycle, cache, fetcher)
    }

    fn steady_state(lifecycle: LifecycleController<F>, cache: AssetCache, fetcher: Arc<F>) -> Result<Self, LifecycleError> {
        let generation = lifecycle.generation()?;
        let policy = InterceptionPolicy::new(fetcher.clone(), generation);
        let control = ControlChannel::new(cache, lifecycle.version()).spawn();

        info!(version = lifecycle.version(), "Cache worker running");

        Ok(Self {
            lifecycle,
            policy,
            control,
            fetcher,
        })
    }

    pub fn version(&self) -> &str {
        self.lifecycle.version()
    }

    /// Perform `request` the way an application session would see it.
    ///
    /// GET requests go through the interception policy and always produce a
    /// response. Other methods go straight to the network and may fail.
    pub async fn fetch(&self, request: Request) -> Result<ResponseSnapshot, FetchError> {
        match self.policy.handle(&request).await {
            Disposition::Respond(response) => Ok(response),
            Disposition::Bypass => self.fetcher.fetch(&request).await,
        }
    }

    pub async fn post_message(&self, message: ControlMessage) -> Option<ControlReply> {
        self.control.post(message).await
    }

    /// Dispatch one event. Fetch events are answered in full before returning.
    pub async fn dispatch(&self, event: WorkerEvent) {
        match event {
            WorkerEvent::Fetch { request, reply } => {
                let response = self.fetch(request).await;
                let _ = reply.send(response);
            }
            WorkerEvent::Message { message, reply } => {
                let answer = self.post_message(message).await;
                if let (Some(reply), Some(answer)) = (reply, answer) {
                    let _ = reply.send(answer);
                }
            }
        }
    }

    /// Wait for background cache writes to finish.
    pub async fn shutdown(self) {
        self.policy.settle().await;
        info!(version = self.lifecycle.version(), "Cache worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::stub::StubFetcher;
    use reqwest::{Method, Url};

    const ORIGIN: &str = "http://localhost:8080/";

    async fn start(fetcher: Arc<StubFetcher>, cache: AssetCache) -> Worker<StubFetcher> {
        let config = LifecycleConfig {
            version: "attendance-v1".to_string(),
            origin: Url::parse(ORIGIN).unwrap(),
            shell_manifest: vec!["/".to_string(), "/index.html".to_string()],
        };
        let (worker, startup) = Worker::start(config, cache, fetcher).await.unwrap();
        assert!(startup.install.report.is_complete());
        worker
    }

    fn stub() -> Arc<StubFetcher> {
        Arc::new(
            StubFetcher::new()
                .route("http://localhost:8080/", ResponseSnapshot::new(200, "OK", "root"))
                .route("http://localhost:8080/index.html", ResponseSnapshot::new(200, "OK", "<html>")),
        )
    }

    #[tokio::test]
    async fn test_shell_loads_offline_after_start() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = stub();
        let worker = start(fetcher.clone(), AssetCache::new(dir.path().to_path_buf()).unwrap()).await;

        fetcher.set_offline(true);
        let response = worker
            .fetch(Request::get(Url::parse("http://localhost:8080/index.html").unwrap()))
            .await
            .unwrap();
        assert_eq!(response.text(), "<html>");
    }

    #[tokio::test]
    async fn test_bypassed_request_surfaces_network_error() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = stub();
        let worker = start(fetcher.clone(), AssetCache::new(dir.path().to_path_buf()).unwrap()).await;

        fetcher.set_offline(true);
        let post = Request::new(Method::POST, Url::parse("http://localhost:8080/api").unwrap());
        assert!(worker.fetch(post).await.is_err());
    }

    #[tokio::test]
    async fn test_resume_serves_previous_install() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(dir.path().to_path_buf()).unwrap();
        let fetcher = stub();
        start(fetcher.clone(), cache.clone()).await.shutdown().await;

        let config = LifecycleConfig {
            version: "attendance-v1".to_string(),
            origin: Url::parse(ORIGIN).unwrap(),
            shell_manifest: vec![],
        };
        let resumed = Worker::resume(config, cache, fetcher.clone()).await.unwrap();
        fetcher.set_offline(true);

        let response = resumed.fetch(Request::get(Url::parse(ORIGIN).unwrap())).await.unwrap();
        assert_eq!(response.text(), "root");
    }

    #[tokio::test]
    async fn test_dispatch_events() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(dir.path().to_path_buf()).unwrap();
        let worker = start(stub(), cache.clone()).await;

        let (tx, rx) = oneshot::channel();
        worker
            .dispatch(WorkerEvent::Fetch {
                request: Request::get(Url::parse(ORIGIN).unwrap()),
                reply: tx,
            })
            .await;
        assert_eq!(rx.await.unwrap().unwrap().text(), "root");
        worker.policy.settle().await;

        let (tx, rx) = oneshot::channel();
        worker
            .dispatch(WorkerEvent::Message {
                message: ControlMessage::ClearCache,
                reply: Some(tx),
            })
            .await;
        assert_eq!(rx.await.unwrap(), ControlReply { cleared: true });
        assert!(!cache.exists("attendance-v1").await);

        worker.shutdown().await;
    }
}
