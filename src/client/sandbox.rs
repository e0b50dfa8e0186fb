//! Sandbox operations on [`VOneClient`]
//!
//! Thin wrappers that build a request, execute it and unwrap the typed
//! response, plus polling for analysis completion.

use std::path::Path;
use std::time::Duration;

use log::{debug, info};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::api::{
    CheckConnection, Download, GetAnalysisResults, GetDailyReserve, GetSubmissionStatus,
    GetSuspiciousObjects, ListAnalysisResults, ListSubmissions, SubmitFile, SubmitUrls,
};
use super::models::{
    AnalysisResult, Connectivity, DailyReserve, Page, Status, Submission, SubmissionHeaders,
    SubmitFileResponse, SubmitUrlResult, SuspiciousObject,
};
use super::pagination::Paginator;
use super::vone::VOneClient;
use crate::error::{Error, ErrorCode, Result};

/// A 2xx that carried no body where one was required
fn required<T>(slot: Option<T>, what: &str) -> Result<T> {
    slot.ok_or_else(|| Error::InvalidResponse(format!("empty {} response", what)))
}

impl VOneClient {
    // ========================================================================
    // Health & quota
    // ========================================================================

    pub async fn check_connection(&self, ctx: &CancellationToken) -> Result<Connectivity> {
        let mut request = CheckConnection::new();
        self.execute(ctx, &mut request).await?;
        required(request.into_response(), "connectivity")
    }

    pub async fn daily_reserve(&self, ctx: &CancellationToken) -> Result<DailyReserve> {
        let mut request = GetDailyReserve::new();
        self.execute(ctx, &mut request).await?;
        required(request.into_response(), "submission usage")
    }

    // ========================================================================
    // Submission
    // ========================================================================

    pub async fn submit_file(
        &self,
        ctx: &CancellationToken,
        mut request: SubmitFile,
    ) -> Result<(SubmitFileResponse, SubmissionHeaders)> {
        self.execute(ctx, &mut request).await?;
        let (response, headers) = request.into_parts();
        Ok((required(response, "file submission")?, headers))
    }

    pub async fn submit_urls<I, S>(
        &self,
        ctx: &CancellationToken,
        urls: I,
    ) -> Result<(Vec<SubmitUrlResult>, SubmissionHeaders)>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut request = SubmitUrls::new().add_urls(urls);
        self.execute(ctx, &mut request).await?;
        Ok(request.into_parts())
    }

    // ========================================================================
    // Results
    // ========================================================================

    pub async fn submission_status(&self, ctx: &CancellationToken, id: &str) -> Result<Submission> {
        let mut request = GetSubmissionStatus::new(id)?;
        self.execute(ctx, &mut request).await?;
        required(request.into_response(), "submission status")
    }

    pub async fn analysis_results(&self, ctx: &CancellationToken, id: &str) -> Result<AnalysisResult> {
        let mut request = GetAnalysisResults::new(id)?;
        self.execute(ctx, &mut request).await?;
        required(request.into_response(), "analysis results")
    }

    pub async fn suspicious_objects(
        &self,
        ctx: &CancellationToken,
        id: &str,
    ) -> Result<Vec<SuspiciousObject>> {
        let mut request = GetSuspiciousObjects::new(id)?;
        self.execute(ctx, &mut request).await?;
        Ok(request.into_items())
    }

    /// Download the PDF report of analysis `id` into `path`.
    pub async fn download_report(
        &self,
        ctx: &CancellationToken,
        id: &str,
        path: impl AsRef<Path>,
    ) -> Result<u64> {
        let mut request = Download::report(id)?;
        self.execute(ctx, &mut request).await?;
        request.store(ctx, path).await
    }

    /// Download the investigation package of analysis `id` into `path`.
    pub async fn download_investigation_package(
        &self,
        ctx: &CancellationToken,
        id: &str,
        path: impl AsRef<Path>,
    ) -> Result<u64> {
        let mut request = Download::investigation_package(id)?;
        self.execute(ctx, &mut request).await?;
        request.store(ctx, path).await
    }

    // ========================================================================
    // Listings
    // ========================================================================

    /// Every submission matching `request`'s filters, across all pages.
    pub async fn list_submissions(
        &self,
        ctx: &CancellationToken,
        mut request: ListSubmissions,
    ) -> Result<Vec<Submission>> {
        Paginator::new(self, &mut request, |page: Page<Submission>| page.items)
            .collect_all(ctx)
            .await
    }

    /// Every analysis result matching `request`'s filters, across all pages.
    pub async fn list_analysis_results(
        &self,
        ctx: &CancellationToken,
        mut request: ListAnalysisResults,
    ) -> Result<Vec<AnalysisResult>> {
        Paginator::new(self, &mut request, |page: Page<AnalysisResult>| page.items)
            .collect_all(ctx)
            .await
    }

    // ========================================================================
    // Polling
    // ========================================================================

    /// Poll task `id` every `interval` until it leaves the running state.
    ///
    /// Returns the final task record on success, [`Error::Submission`] if
    /// the sandbox reports a failure and [`Error::Timeout`] once `timeout`
    /// has elapsed.
    pub async fn wait_for_analysis(
        &self,
        ctx: &CancellationToken,
        id: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Submission> {
        let started = Instant::now();
        loop {
            let status = self.submission_status(ctx, id).await?;
            match status.status {
                Status::Succeeded => {
                    info!("Analysis {} finished", id);
                    return Ok(status);
                }
                Status::Failed => {
                    let (code, message) = status
                        .failure()
                        .map(|(code, message)| (code, message.to_string()))
                        .unwrap_or((ErrorCode::Unknown, String::new()));
                    return Err(Error::Submission { code, message });
                }
                Status::Running => {}
            }

            if started.elapsed() >= timeout {
                return Err(Error::Timeout(timeout));
            }
            debug!("Analysis {} still running", id);
            tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}
