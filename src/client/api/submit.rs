//! File and URL submission
//!
//! Both requests are one-shot: a second `execute` fails with
//! [`ValidationError::AlreadyUsed`] instead of submitting again.

use std::path::Path;

use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::Serialize;

use crate::client::models::{SubmissionHeaders, SubmitFileResponse, SubmitUrlResult};
use crate::client::request::{
    ApiRequest, HeaderSlot, RequestBase, RequestBody, ResponseHeaders, ResponseTarget,
};
use crate::error::{Result, ValidationError};

impl ResponseHeaders for SubmissionHeaders {
    fn slots(&mut self) -> Vec<(&'static str, HeaderSlot<'_>)> {
        vec![
            (
                "Operation-Location",
                HeaderSlot::Text(&mut self.operation_location),
            ),
            (
                "TMV1-Submission-Reserve-Count",
                HeaderSlot::Integer(&mut self.submission_reserve_count),
            ),
            (
                "TMV1-Submission-Remaining-Count",
                HeaderSlot::Integer(&mut self.submission_remaining_count),
            ),
            (
                "TMV1-Submission-Count",
                HeaderSlot::Integer(&mut self.submission_count),
            ),
            (
                "TMV1-Submission-Exemption-Count",
                HeaderSlot::Integer(&mut self.submission_exemption_count),
            ),
        ]
    }
}

/// `POST /v3.0/sandbox/files/analyze`
#[derive(Debug)]
pub struct SubmitFile {
    base: RequestBase,
    file: Option<(Vec<u8>, String)>,
    document_password: Option<String>,
    archive_password: Option<String>,
    arguments: Option<String>,
    response: Option<SubmitFileResponse>,
    headers: SubmissionHeaders,
}

impl Default for SubmitFile {
    fn default() -> Self {
        Self {
            base: RequestBase::one_shot(),
            file: None,
            document_password: None,
            archive_password: None,
            arguments: None,
            response: None,
            headers: SubmissionHeaders::default(),
        }
    }
}

impl SubmitFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the sample from disk, naming it after the file.
    pub async fn with_path(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sample".to_string());
        Ok(self.with_bytes(data, name))
    }

    pub fn with_bytes(mut self, data: Vec<u8>, file_name: impl Into<String>) -> Self {
        self.file = Some((data, file_name.into()));
        self
    }

    /// Password of an encrypted document, Base64-encoded.
    pub fn document_password(mut self, password: impl Into<String>) -> Self {
        self.document_password = Some(password.into());
        self
    }

    /// Password of an encrypted archive, Base64-encoded.
    pub fn archive_password(mut self, password: impl Into<String>) -> Self {
        self.archive_password = Some(password.into());
        self
    }

    /// Command line arguments for the sample, Base64-encoded.
    pub fn arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = Some(arguments.into());
        self
    }

    pub fn response(&self) -> Option<&SubmitFileResponse> {
        self.response.as_ref()
    }

    pub fn headers(&self) -> &SubmissionHeaders {
        &self.headers
    }

    pub fn into_parts(self) -> (Option<SubmitFileResponse>, SubmissionHeaders) {
        (self.response, self.headers)
    }
}

impl ApiRequest for SubmitFile {
    request_base!();

    fn method(&self) -> Method {
        Method::POST
    }

    fn path(&self) -> String {
        "/v3.0/sandbox/files/analyze".to_string()
    }

    /// Rebuilt from the stored bytes on every dispatch, so a rate-limited
    /// retry uploads the complete file again.
    fn body(&mut self) -> Result<Option<RequestBody>> {
        let (data, name) = self
            .file
            .as_ref()
            .ok_or(ValidationError::MissingInput("file"))?;
        let mut form = Form::new().part("file", Part::bytes(data.clone()).file_name(name.clone()));
        if let Some(password) = &self.document_password {
            form = form.text("documentPassword", password.clone());
        }
        if let Some(password) = &self.archive_password {
            form = form.text("archivePassword", password.clone());
        }
        if let Some(arguments) = &self.arguments {
            form = form.text("arguments", arguments.clone());
        }
        Ok(Some(RequestBody::Multipart(form)))
    }

    fn response_target(&mut self) -> Option<&mut dyn ResponseTarget> {
        Some(&mut self.response)
    }

    fn response_headers(&mut self) -> Option<&mut dyn ResponseHeaders> {
        Some(&mut self.headers)
    }
}

#[derive(Debug, Clone, Serialize)]
struct UrlEntry {
    url: String,
}

/// `POST /v3.0/sandbox/urls/analyze`
#[derive(Debug)]
pub struct SubmitUrls {
    base: RequestBase,
    urls: Vec<UrlEntry>,
    response: Option<Vec<SubmitUrlResult>>,
    headers: SubmissionHeaders,
}

impl Default for SubmitUrls {
    fn default() -> Self {
        Self {
            base: RequestBase::one_shot(),
            urls: Vec::new(),
            response: None,
            headers: SubmissionHeaders::default(),
        }
    }
}

impl SubmitUrls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_url(mut self, url: impl Into<String>) -> Self {
        self.urls.push(UrlEntry { url: url.into() });
        self
    }

    pub fn add_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.urls
            .extend(urls.into_iter().map(|url| UrlEntry { url: url.into() }));
        self
    }

    /// Per-URL outcomes, in submission order.
    pub fn response(&self) -> &[SubmitUrlResult] {
        self.response.as_deref().unwrap_or_default()
    }

    pub fn headers(&self) -> &SubmissionHeaders {
        &self.headers
    }

    pub fn into_parts(self) -> (Vec<SubmitUrlResult>, SubmissionHeaders) {
        (self.response.unwrap_or_default(), self.headers)
    }
}

impl ApiRequest for SubmitUrls {
    request_base!();

    fn method(&self) -> Method {
        Method::POST
    }

    fn path(&self) -> String {
        "/v3.0/sandbox/urls/analyze".to_string()
    }

    fn body(&mut self) -> Result<Option<RequestBody>> {
        if self.urls.is_empty() {
            return Err(ValidationError::MissingInput("url").into());
        }
        Ok(Some(RequestBody::Bytes(serde_json::to_vec(&self.urls)?)))
    }

    fn response_target(&mut self) -> Option<&mut dyn ResponseTarget> {
        Some(&mut self.response)
    }

    fn response_headers(&mut self) -> Option<&mut dyn ResponseHeaders> {
        Some(&mut self.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::VOneClient;
    use crate::error::Error;
    use mockito::Matcher;
    use tokio_util::sync::CancellationToken;

    fn client_for(server: &mockito::ServerGuard) -> VOneClient {
        VOneClient::new("example.invalid", "t")
            .unwrap()
            .with_base_url(server.url())
    }

    #[tokio::test]
    async fn test_submit_file_uploads_multipart_and_reads_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v3.0/sandbox/files/analyze")
            .match_header(
                "content-type",
                Matcher::Regex("^multipart/form-data; boundary=".to_string()),
            )
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="file"; filename="sample.exe""#.to_string()),
                Matcher::Regex("MZ-payload".to_string()),
                Matcher::Regex(r#"name="arguments""#.to_string()),
            ]))
            .with_status(202)
            .with_header("Operation-Location", "https://api/v3.0/sandbox/tasks/abc")
            .with_header("TMV1-Submission-Reserve-Count", "100")
            .with_header("TMV1-Submission-Remaining-Count", "99")
            .with_header("TMV1-Submission-Count", "1")
            .with_header("TMV1-Submission-Exemption-Count", "0")
            .with_body(r#"{"id":"012e4eac-9bd9-4e89-95db-77e02f75a6f3","digest":{"md5":"m","sha1":"s","sha256":"x"},"arguments":"LXg="}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let mut request = SubmitFile::new()
            .with_bytes(b"MZ-payload".to_vec(), "sample.exe")
            .arguments("LXg=");
        client
            .execute(&CancellationToken::new(), &mut request)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            request.response().unwrap().id,
            "012e4eac-9bd9-4e89-95db-77e02f75a6f3"
        );
        let headers = request.headers();
        assert_eq!(headers.operation_location, "https://api/v3.0/sandbox/tasks/abc");
        assert_eq!(headers.submission_reserve_count, 100);
        assert_eq!(headers.submission_remaining_count, 99);
        assert_eq!(headers.submission_count, 1);
        assert_eq!(headers.submission_exemption_count, 0);
    }

    #[tokio::test]
    async fn test_submit_file_without_file_is_rejected() {
        let server = mockito::Server::new_async().await;
        let client = client_for(&server);
        let mut request = SubmitFile::new();
        let err = client
            .execute(&CancellationToken::new(), &mut request)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::MissingInput("file"))
        ));
    }

    #[tokio::test]
    async fn test_submit_file_from_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dropper.bin");
        std::fs::write(&path, b"payload").unwrap();

        let request = SubmitFile::new().with_path(&path).await.unwrap();
        let (data, name) = request.file.as_ref().unwrap();
        assert_eq!(data, b"payload");
        assert_eq!(name, "dropper.bin");
    }

    #[tokio::test]
    async fn test_submit_urls() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v3.0/sandbox/urls/analyze")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(serde_json::json!([
                {"url": "https://a.example"},
                {"url": "https://b.example"}
            ])))
            .with_status(207)
            .with_header("TMV1-Submission-Remaining-Count", "98")
            .with_body(r#"[
                {"status":202,"body":{"url":"https://a.example","id":"1","digest":{"md5":"","sha1":"","sha256":""}}},
                {"status":400,"body":{"url":"https://b.example","error":{"code":"BadRequest","message":"Invalid URL"}}}
            ]"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let mut request = SubmitUrls::new()
            .add_url("https://a.example")
            .add_urls(["https://b.example"]);
        client
            .execute(&CancellationToken::new(), &mut request)
            .await
            .unwrap();

        mock.assert_async().await;
        let results = request.response();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, 202);
        assert_eq!(
            results[1].body.error.as_ref().unwrap().message,
            "Invalid URL"
        );
        assert_eq!(request.headers().submission_remaining_count, 98);

        let again = client
            .execute(&CancellationToken::new(), &mut request)
            .await
            .unwrap_err();
        assert!(matches!(
            again,
            Error::Validation(ValidationError::AlreadyUsed)
        ));
    }
}
