use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use futures::stream::{self, StreamExt};
use reqwest::Url;
use tokio::fs;
use tracing::{debug, info, warn};

use super::{CacheError, CachedData, StoredEntry};
use crate::fetch::{Fetch, Request, RequestIdentity, ResponseSnapshot};

/// Maximum concurrent fetches while populating a generation.
/// The shell manifest is small; this only bounds pathological manifests.
const MAX_CONCURRENT_FETCHES: usize = 6;

/// Suffix counter so concurrent writers never share a file name
static FILE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Reads retried when an overwrite removes the body between metadata and body reads
const LOOKUP_ATTEMPTS: usize = 3;

/// Root of all cache buckets.
/// Clone is cheap and every clone addresses the same storage.
#[derive(Debug, Clone)]
pub struct AssetCache {
    root: PathBuf,
}

impl AssetCache {
    pub fn new(root: PathBuf) -> Result<Self, CacheError> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Handle for the bucket named `tag`, without touching the disk.
    pub fn generation(&self, tag: &str) -> Result<Generation, CacheError> {
        validate_tag(tag)?;
        Ok(Generation {
            tag: tag.to_string(),
            dir: self.root.join(tag),
        })
    }

    /// Open the bucket for `tag`, creating it if needed.
    pub async fn create_generation(&self, tag: &str) -> Result<Generation, CacheError> {
        let generation = self.generation(tag)?;
        fs::create_dir_all(&generation.dir).await?;
        debug!(tag, "Opened cache generation");
        Ok(generation)
    }

    /// Tags of every bucket currently on disk, sorted.
    pub async fn tags(&self) -> Result<Vec<String>, CacheError> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut tags = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                tags.push(name.to_string());
            }
        }
        tags.sort();
        Ok(tags)
    }

    pub async fn exists(&self, tag: &str) -> bool {
        match self.generation(tag) {
            Ok(generation) => fs::metadata(&generation.dir)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Delete every bucket except `current`. Returns the deleted tags.
    pub async fn prune_others(&self, current: &str) -> Result<Vec<String>, CacheError> {
        let mut pruned = Vec::new();
        for tag in self.tags().await? {
            if tag == current {
                continue;
            }
            fs::remove_dir_all(self.root.join(&tag)).await?;
            info!(tag = %tag, "Pruned stale cache generation");
            pruned.push(tag);
        }
        Ok(pruned)
    }

    /// Remove the bucket for `tag` entirely.
    /// Returns false when there was nothing to delete or removal failed.
    pub async fn delete(&self, tag: &str) -> bool {
        let generation = match self.generation(tag) {
            Ok(generation) => generation,
            Err(e) => {
                warn!(error = %e, "Refusing to delete cache");
                return false;
            }
        };

        match fs::remove_dir_all(&generation.dir).await {
            Ok(()) => {
                info!(tag, "Deleted cache generation");
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                warn!(tag, error = %e, "Failed to delete cache generation");
                false
            }
        }
    }
}

/// Outcome of populating a generation from the shell manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulateReport {
    /// URLs stored, in manifest order
    pub cached: Vec<String>,
    /// URLs skipped with the reason, in manifest order
    pub failed: Vec<(String, String)>,
}

impl PopulateReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// One named cache bucket.
#[derive(Debug, Clone)]
pub struct Generation {
    tag: String,
    dir: PathBuf,
}

impl Generation {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    fn meta_path(&self, identity: &RequestIdentity) -> PathBuf {
        self.dir.join(format!("{}.json", identity.digest()))
    }

    async fn read_meta(&self, identity: &RequestIdentity) -> Result<Option<CachedData<StoredEntry>>, CacheError> {
        match fs::read(self.meta_path(identity)).await {
            Ok(meta) => Ok(Some(serde_json::from_slice(&meta)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Path of a body file named by metadata, if the name stays inside the bucket.
    fn body_path(&self, body_file: &str) -> Option<PathBuf> {
        let name = Path::new(body_file).file_name()?;
        (name == body_file).then(|| self.dir.join(name))
    }

    /// Fetch and store every manifest URL.
    ///
    /// Failures are logged and skipped; the rest of the manifest is still
    /// attempted. Never fails as a whole.
    pub async fn populate<F: Fetch>(&self, manifest: &[Url], fetcher: &F) -> PopulateReport {
        let outcomes: Vec<(Url, Result<(), String>)> = stream::iter(manifest.iter().cloned())
            .map(|url| async move {
                let result = self.populate_one(&url, fetcher).await;
                (url, result)
            })
            .buffered(MAX_CONCURRENT_FETCHES)
            .collect()
            .await;

        let mut report = PopulateReport::default();
        for (url, result) in outcomes {
            match result {
                Ok(()) => report.cached.push(url.to_string()),
                Err(reason) => {
                    warn!(tag = %self.tag, url = %url, reason = %reason, "Skipping shell entry");
                    report.failed.push((url.to_string(), reason));
                }
            }
        }
        report
    }

    async fn populate_one<F: Fetch>(&self, url: &Url, fetcher: &F) -> Result<(), String> {
        let request = Request::get(url.clone());
        let response = fetcher.fetch(&request).await.map_err(|e| e.to_string())?;
        if !response.is_cacheable() {
            return Err(format!("status {} is not cacheable", response.status));
        }
        match self.store(&request.identity(), response).await {
            Ok(true) => Ok(()),
            Ok(false) => Err("response rejected by cache".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Previously stored response for `identity`, if any.
    pub async fn lookup(&self, identity: &RequestIdentity) -> Result<Option<ResponseSnapshot>, CacheError> {
        for _ in 0..LOOKUP_ATTEMPTS {
            let Some(cached) = self.read_meta(identity).await? else {
                return Ok(None);
            };
            let Some(body_path) = self.body_path(&cached.data.body_file) else {
                warn!(tag = %self.tag, %identity, "Ignoring cache entry with invalid body name");
                return Ok(None);
            };

            match fs::read(&body_path).await {
                Ok(body) => {
                    let mut response = cached.data.response;
                    response.body = body;
                    return Ok(Some(response));
                }
                // Replaced by a concurrent store; the new metadata names a new body
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    /// Store `response` under `identity` if it is cacheable.
    ///
    /// Returns `Ok(false)` when the response was not admitted. Creates the
    /// bucket directory if it was deleted underneath us.
    pub async fn store(&self, identity: &RequestIdentity, response: ResponseSnapshot) -> Result<bool, CacheError> {
        if !response.is_cacheable() {
            debug!(%identity, status = response.status, "Not admitting response to cache");
            return Ok(false);
        }

        fs::create_dir_all(&self.dir).await?;

        let body_file = format!("{}-{}.body", identity.digest(), unique_suffix());
        let body_path = self.dir.join(&body_file);
        fs::write(&body_path, &response.body).await?;

        let previous = match self.read_meta(identity).await {
            Ok(previous) => previous.map(|p| p.data.body_file),
            Err(_) => None,
        };

        let entry = CachedData::new(StoredEntry {
            method: identity.method.to_string(),
            url: identity.url.to_string(),
            body_file: body_file.clone(),
            response,
        });
        let published = match serde_json::to_vec_pretty(&entry) {
            Ok(meta) => write_replace(&self.meta_path(identity), &meta).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = published {
            let _ = fs::remove_file(&body_path).await;
            return Err(e);
        }

        if let Some(old) = previous.filter(|old| *old != body_file) {
            if let Some(old_path) = self.body_path(&old) {
                let _ = fs::remove_file(old_path).await;
            }
        }

        debug!(tag = %self.tag, %identity, "Stored response");
        Ok(true)
    }

    /// Metadata of every readable entry, sorted by URL.
    pub async fn entries(&self) -> Result<Vec<CachedData<StoredEntry>>, CacheError> {
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(file) = dir.next_entry().await? {
            let path = file.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = fs::read(&path).await?;
            match serde_json::from_slice::<CachedData<StoredEntry>>(&contents) {
                Ok(entry) => entries.push(entry),
                Err(e) => debug!(path = %path.display(), error = %e, "Skipping unreadable cache entry"),
            }
        }
        entries.sort_by(|a, b| a.data.url.cmp(&b.data.url));
        Ok(entries)
    }
}

/// Write through a temp file and rename, so readers see old or new, never half.
async fn write_replace(path: &Path, contents: &[u8]) -> Result<(), CacheError> {
    let tmp = path.with_extension(format!("tmp{}", unique_suffix()));
    fs::write(&tmp, contents).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Process id plus a counter, unique across concurrent writers and processes.
fn unique_suffix() -> String {
    format!("{}-{}", std::process::id(), FILE_SEQ.fetch_add(1, Ordering::Relaxed))
}

/// Tags name directories, so keep them to a safe character set.
fn validate_tag(tag: &str) -> Result<(), CacheError> {
    let valid = !tag.is_empty()
        && tag != "."
        && tag != ".."
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidTag(tag.to_string()))
    }
}
