//! Task status, analysis results and downloads

use std::path::Path;

use log::{debug, warn};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use super::checked_id;
use crate::client::models::{AnalysisResult, Page, Submission, SuspiciousObject};
use crate::client::request::{ApiRequest, RequestBase, ResponseTarget};
use crate::error::{Error, Result, ValidationError};

/// `GET /v3.0/sandbox/tasks/{id}`
#[derive(Debug)]
pub struct GetSubmissionStatus {
    base: RequestBase,
    id: String,
    response: Option<Submission>,
}

impl GetSubmissionStatus {
    pub fn new(id: &str) -> std::result::Result<Self, ValidationError> {
        Ok(Self {
            base: RequestBase::new(),
            id: checked_id(id)?,
            response: None,
        })
    }

    pub fn into_response(self) -> Option<Submission> {
        self.response
    }
}

impl ApiRequest for GetSubmissionStatus {
    request_base!();

    fn path(&self) -> String {
        format!("/v3.0/sandbox/tasks/{}", self.id)
    }

    fn response_target(&mut self) -> Option<&mut dyn ResponseTarget> {
        Some(&mut self.response)
    }
}

/// `GET /v3.0/sandbox/analysisResults/{id}`
#[derive(Debug)]
pub struct GetAnalysisResults {
    base: RequestBase,
    id: String,
    response: Option<AnalysisResult>,
}

impl GetAnalysisResults {
    pub fn new(id: &str) -> std::result::Result<Self, ValidationError> {
        Ok(Self {
            base: RequestBase::new(),
            id: checked_id(id)?,
            response: None,
        })
    }

    pub fn into_response(self) -> Option<AnalysisResult> {
        self.response
    }
}

impl ApiRequest for GetAnalysisResults {
    request_base!();

    fn path(&self) -> String {
        format!("/v3.0/sandbox/analysisResults/{}", self.id)
    }

    fn response_target(&mut self) -> Option<&mut dyn ResponseTarget> {
        Some(&mut self.response)
    }
}

/// `GET /v3.0/sandbox/analysisResults/{id}/suspiciousObjects`
#[derive(Debug)]
pub struct GetSuspiciousObjects {
    base: RequestBase,
    id: String,
    response: Option<Page<SuspiciousObject>>,
}

impl GetSuspiciousObjects {
    pub fn new(id: &str) -> std::result::Result<Self, ValidationError> {
        Ok(Self {
            base: RequestBase::new(),
            id: checked_id(id)?,
            response: None,
        })
    }

    pub fn into_items(self) -> Vec<SuspiciousObject> {
        self.response.map(|page| page.items).unwrap_or_default()
    }
}

impl ApiRequest for GetSuspiciousObjects {
    request_base!();

    fn path(&self) -> String {
        format!(
            "/v3.0/sandbox/analysisResults/{}/suspiciousObjects",
            self.id
        )
    }

    fn response_target(&mut self) -> Option<&mut dyn ResponseTarget> {
        Some(&mut self.response)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Artifact {
    Report,
    InvestigationPackage,
}

/// Binary download of an analysis artifact.
///
/// The body is not buffered: after `execute` the open response is held
/// until [`store`](Self::store) streams it to disk. One-shot.
#[derive(Debug)]
pub struct Download {
    base: RequestBase,
    id: String,
    artifact: Artifact,
    response: Option<reqwest::Response>,
}

impl Download {
    /// `GET /v3.0/sandbox/analysisResults/{id}/report` (PDF)
    pub fn report(id: &str) -> std::result::Result<Self, ValidationError> {
        Self::new(id, Artifact::Report)
    }

    /// `GET /v3.0/sandbox/analysisResults/{id}/investigationPackage` (ZIP)
    pub fn investigation_package(id: &str) -> std::result::Result<Self, ValidationError> {
        Self::new(id, Artifact::InvestigationPackage)
    }

    fn new(id: &str, artifact: Artifact) -> std::result::Result<Self, ValidationError> {
        Ok(Self {
            base: RequestBase::one_shot(),
            id: checked_id(id)?,
            artifact,
            response: None,
        })
    }

    /// The raw response, for callers that stream it themselves.
    pub fn into_response(self) -> Option<reqwest::Response> {
        self.response
    }

    /// Stream the downloaded body into `path`, returning the bytes written.
    ///
    /// Cancelling `ctx` or a failed read or write removes the partial file.
    pub async fn store(&mut self, ctx: &CancellationToken, path: impl AsRef<Path>) -> Result<u64> {
        let mut response = self
            .response
            .take()
            .ok_or(ValidationError::MissingInput("download response"))?;
        let path = path.as_ref();
        let mut file = tokio::fs::File::create(path).await?;

        let outcome = tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(Error::Cancelled),
            result = copy_body(&mut response, &mut file) => result,
        };
        drop(file);

        match outcome {
            Ok(written) => {
                debug!("Stored {} bytes to {}", written, path.display());
                Ok(written)
            }
            Err(err) => {
                if let Err(remove) = tokio::fs::remove_file(path).await {
                    warn!("Failed to remove partial {}: {}", path.display(), remove);
                }
                Err(err)
            }
        }
    }
}

async fn copy_body(response: &mut reqwest::Response, file: &mut tokio::fs::File) -> Result<u64> {
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

impl ApiRequest for Download {
    request_base!();

    fn path(&self) -> String {
        let leaf = match self.artifact {
            Artifact::Report => "report",
            Artifact::InvestigationPackage => "investigationPackage",
        };
        format!("/v3.0/sandbox/analysisResults/{}/{}", self.id, leaf)
    }

    fn consume_raw(&mut self, response: reqwest::Response) {
        self.response = Some(response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::VOneClient;
    use crate::client::models::{RiskLevel, Status};
    use tokio_util::sync::CancellationToken;

    const ID: &str = "012e4eac-9bd9-4e89-95db-77e02f75a6f3";

    fn client_for(server: &mockito::ServerGuard) -> VOneClient {
        VOneClient::new("example.invalid", "t")
            .unwrap()
            .with_base_url(server.url())
    }

    #[test]
    fn test_ids_are_validated() {
        assert!(GetSubmissionStatus::new("not-a-uuid").is_err());
        assert!(GetAnalysisResults::new("").is_err());
        assert!(Download::report("1/../2").is_err());
        assert!(GetSuspiciousObjects::new(ID).is_ok());
    }

    #[test]
    fn test_paths() {
        assert_eq!(
            GetSubmissionStatus::new(ID).unwrap().path(),
            format!("/v3.0/sandbox/tasks/{}", ID)
        );
        assert_eq!(
            Download::investigation_package(ID).unwrap().path(),
            format!("/v3.0/sandbox/analysisResults/{}/investigationPackage", ID)
        );
    }

    #[tokio::test]
    async fn test_submission_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("/v3.0/sandbox/tasks/{}", ID).as_str())
            .with_body(format!(
                r#"{{"id":"{}","action":"analyzeFile","status":"succeeded","createdDateTime":"2021-05-07T03:08:40Z","lastActionDateTime":"2021-05-07T03:10:40Z","resourceLocation":"https://x/analysisResults/{}","isCached":false,"digest":{{"md5":"a","sha1":"b","sha256":"c"}},"arguments":""}}"#,
                ID, ID
            ))
            .create_async()
            .await;

        let client = client_for(&server);
        let mut request = GetSubmissionStatus::new(ID).unwrap();
        client
            .execute(&CancellationToken::new(), &mut request)
            .await
            .unwrap();
        let status = request.into_response().unwrap();
        assert_eq!(status.status, Status::Succeeded);
        assert_eq!(status.digest.sha1, "b");
    }

    #[tokio::test]
    async fn test_analysis_results_and_objects() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("/v3.0/sandbox/analysisResults/{}", ID).as_str())
            .with_body(r#"{"id":"x","type":"file","riskLevel":"medium","trueFileType":"pdf","detectionNames":[],"threatTypes":[]}"#)
            .create_async()
            .await;
        server
            .mock(
                "GET",
                format!("/v3.0/sandbox/analysisResults/{}/suspiciousObjects", ID).as_str(),
            )
            .with_body(r#"{"items":[{"riskLevel":"high","rootSha1":"ABC","type":"ip","value":"6.6.6.6","analysisCompletionDateTime":"2021-05-07T03:08:40Z","expiredDateTime":"2021-06-07T03:08:40Z"}]}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let ctx = CancellationToken::new();

        let mut results = GetAnalysisResults::new(ID).unwrap();
        client.execute(&ctx, &mut results).await.unwrap();
        let results = results.into_response().unwrap();
        assert_eq!(results.risk_level, RiskLevel::Medium);
        assert_eq!(results.true_file_type, "pdf");

        let mut objects = GetSuspiciousObjects::new(ID).unwrap();
        client.execute(&ctx, &mut objects).await.unwrap();
        let objects = objects.into_items();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].kind, "ip");
        assert_eq!(objects[0].value, serde_json::json!("6.6.6.6"));
    }

    #[tokio::test]
    async fn test_download_streams_to_disk() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock(
                "GET",
                format!("/v3.0/sandbox/analysisResults/{}/report", ID).as_str(),
            )
            .with_header("content-type", "application/pdf")
            .with_body("%PDF-1.7 report body")
            .create_async()
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("report.pdf");
        let client = client_for(&server);
        let ctx = CancellationToken::new();
        let mut download = Download::report(ID).unwrap();
        client.execute(&ctx, &mut download).await.unwrap();
        let written = download.store(&ctx, &out).await.unwrap();

        assert_eq!(written, 20);
        assert_eq!(std::fs::read(&out).unwrap(), b"%PDF-1.7 report body");

        // The body was consumed by the first store
        assert!(download.store(&ctx, &out).await.is_err());
    }

    #[tokio::test]
    async fn test_cancelled_download_leaves_no_file() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock(
                "GET",
                format!("/v3.0/sandbox/analysisResults/{}/investigationPackage", ID).as_str(),
            )
            .with_body(vec![0u8; 64 * 1024])
            .create_async()
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("package.zip");
        let client = client_for(&server);
        let ctx = CancellationToken::new();
        let mut download = Download::investigation_package(ID).unwrap();
        client.execute(&ctx, &mut download).await.unwrap();

        ctx.cancel();
        let err = download.store(&ctx, &out).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(!out.exists());
    }
}
