//! Cached front end for sandbox analysis
//!
//! Looks a sample up by content hash before submitting it, and remembers
//! every analysis it had to fetch from the API.

use std::path::Path;
use std::time::Duration;

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::cache::{ArtifactKey, CachedResult, ResultCache};
use crate::client::VOneClient;
use crate::client::api::SubmitFile;
use crate::client::models::AnalysisResult;
use crate::error::Result;

/// Polling cadence while waiting for an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Sandbox client with an optional result cache in front.
///
/// Without a cache (`--no-cache`) every call goes to the network.
pub struct CachedSandbox {
    client: VOneClient,
    cache: Option<ResultCache>,
}

impl CachedSandbox {
    pub fn new(client: VOneClient, cache: Option<ResultCache>) -> Self {
        Self { client, cache }
    }

    pub fn client(&self) -> &VOneClient {
        &self.client
    }

    pub fn cache(&self) -> Option<&ResultCache> {
        self.cache.as_ref()
    }

    /// Cache-only lookup by SHA-1.
    pub fn lookup(&self, sha1: &str) -> Result<Option<CachedResult>> {
        match &self.cache {
            Some(cache) => Ok(cache.query(sha1)?),
            None => Ok(None),
        }
    }

    /// Analysis of the file at `path`, from cache when possible.
    pub async fn analyze_file(
        &self,
        ctx: &CancellationToken,
        path: &Path,
        poll: PollSettings,
    ) -> Result<AnalysisResult> {
        let data = tokio::fs::read(path).await?;
        let key = ArtifactKey::of_bytes(&data);

        if let Some(hit) = self.cached(&key)? {
            debug!("Cache hit for {} ({})", path.display(), key.sha1);
            return Ok(hit);
        }
        debug!("Cache miss for {} ({})", path.display(), key.sha1);

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| key.sha1.clone());
        let request = SubmitFile::new().with_bytes(data, name);
        let (submitted, headers) = self.client.submit_file(ctx, request).await?;
        debug!(
            "Submitted {} as {}, {} submissions left today",
            path.display(),
            submitted.id,
            headers.submission_remaining_count
        );

        self.client
            .wait_for_analysis(ctx, &submitted.id, poll.interval, poll.timeout)
            .await?;
        let result = self.client.analysis_results(ctx, &submitted.id).await?;

        if let Some(cache) = &self.cache {
            cache.add(&result)?;
        }
        Ok(result)
    }

    fn cached(&self, key: &ArtifactKey) -> Result<Option<AnalysisResult>> {
        let Some(hit) = self.lookup(&key.sha1)? else {
            return Ok(None);
        };
        let digest = &hit.result.digest;
        if !key.matches(&digest.sha1, &digest.sha256) {
            warn!("Cached SHA-256 for {} does not match the file, ignoring", key.sha1);
            return Ok(None);
        }
        Ok(Some(hit.result))
    }
}
