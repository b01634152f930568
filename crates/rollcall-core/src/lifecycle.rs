//! Install and activation of a cache generation.
//!
//! A controller is built for exactly one version tag and moves through
//! `Parsed -> Installed -> Activated` once. Deploying a new version means
//! building a new controller with a new tag.

use std::fmt;
use std::sync::Arc;

use reqwest::Url;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cache::{AssetCache, CacheError, Generation, PopulateReport};
use crate::fetch::{resolve_url, Fetch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed, nothing on disk yet
    Parsed,
    /// Generation created and populated
    Installed,
    /// Older generations pruned and sessions claimed
    Activated,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Parsed => "parsed",
            Phase::Installed => "installed",
            Phase::Activated => "activated",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Cannot {action} while {from}")]
    InvalidTransition { from: Phase, action: &'static str },

    #[error("Version {0} is not installed")]
    NotInstalled(String),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Version and shell for one deployment.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Tag naming this version's cache generation
    pub version: String,
    /// Base for relative manifest entries
    pub origin: Url,
    /// URLs the shell needs to load offline
    pub shell_manifest: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub report: PopulateReport,
    /// Activate right away instead of waiting for old sessions to close.
    pub skip_waiting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateOutcome {
    pub pruned: Vec<String>,
    /// Sessions that were open and are now controlled by this version
    pub claimed: usize,
}

/// An open application session. Observes which version controls it.
pub struct Session {
    controller: watch::Receiver<Option<String>>,
}

impl Session {
    /// Tag of the controlling version, if any has been activated.
    pub fn controller(&self) -> Option<String> {
        self.controller.borrow().clone()
    }

    /// Wait until a version takes control, then return its tag.
    pub async fn controlled(&mut self) -> Option<String> {
        match self.controller.wait_for(|tag| tag.is_some()).await {
            Ok(tag) => tag.clone(),
            Err(_) => None,
        }
    }
}

pub struct LifecycleController<F> {
    config: LifecycleConfig,
    cache: AssetCache,
    fetcher: Arc<F>,
    phase: Phase,
    controller: watch::Sender<Option<String>>,
}

impl<F: Fetch> LifecycleController<F> {
    pub fn new(config: LifecycleConfig, cache: AssetCache, fetcher: Arc<F>) -> Self {
        let (controller, _) = watch::channel(None);
        Self {
            config,
            cache,
            fetcher,
            phase: Phase::Parsed,
            controller,
        }
    }

    /// Attach to a generation that an earlier run installed and activated.
    ///
    /// Stale generations are pruned again, so an activation that failed
    /// part way through its cleanup is finished here.
    pub async fn resume(config: LifecycleConfig, cache: AssetCache, fetcher: Arc<F>) -> Result<Self, LifecycleError> {
        cache.generation(&config.version)?;
        if !cache.exists(&config.version).await {
            return Err(LifecycleError::NotInstalled(config.version));
        }

        let pruned = cache.prune_others(&config.version).await?;
        if !pruned.is_empty() {
            info!(version = %config.version, pruned = pruned.len(), "Removed stale generations on resume");
        }

        let mut lifecycle = Self::new(config, cache, fetcher);
        lifecycle.phase = Phase::Activated;
        lifecycle
            .controller
            .send_replace(Some(lifecycle.config.version.clone()));
        Ok(lifecycle)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    /// Handle for this version's generation.
    pub fn generation(&self) -> Result<Generation, CacheError> {
        self.cache.generation(&self.config.version)
    }

    /// Register an open session. Sessions opened before activation are
    /// claimed when it happens.
    pub fn open_session(&self) -> Session {
        Session {
            controller: self.controller.subscribe(),
        }
    }

    /// Create this version's generation and fill it from the shell manifest.
    ///
    /// Manifest entries that cannot be resolved or fetched are skipped; only
    /// failing to create the bucket itself fails the install.
    pub async fn install(&mut self) -> Result<InstallOutcome, LifecycleError> {
        self.expect_phase(Phase::Parsed, "install")?;

        let generation = self.cache.create_generation(&self.config.version).await?;

        let mut urls = Vec::with_capacity(self.config.shell_manifest.len());
        let mut unresolved = Vec::new();
        for raw in &self.config.shell_manifest {
            match resolve_url(&self.config.origin, raw) {
                Ok(url) => urls.push(url),
                Err(e) => {
                    warn!(entry = %raw, error = %e, "Skipping unresolvable shell entry");
                    unresolved.push((raw.clone(), e.to_string()));
                }
            }
        }

        let mut report = generation.populate(&urls, self.fetcher.as_ref()).await;
        report.failed.extend(unresolved);

        info!(
            version = %self.config.version,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "Installed cache generation"
        );

        self.phase = Phase::Installed;
        Ok(InstallOutcome {
            report,
            skip_waiting: true,
        })
    }

    /// Remove every other generation, then take control of all open sessions.
    pub async fn activate(&mut self) -> Result<ActivateOutcome, LifecycleError> {
        self.expect_phase(Phase::Installed, "activate")?;

        let pruned = self.cache.prune_others(&self.config.version).await?;

        let claimed = self.controller.receiver_count();
        self.controller.send_replace(Some(self.config.version.clone()));

        info!(version = %self.config.version, pruned = pruned.len(), claimed, "Activated cache generation");

        self.phase = Phase::Activated;
        Ok(ActivateOutcome { pruned, claimed })
    }

    fn expect_phase(&self, expected: Phase, action: &'static str) -> Result<(), LifecycleError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(LifecycleError::InvalidTransition {
                from: self.phase,
                action,
            })
        }
    }
}
