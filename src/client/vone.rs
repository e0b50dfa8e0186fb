//! Vision One API client and dispatch engine

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use reqwest::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use tokio_util::sync::CancellationToken;

use super::rate_limit::{RateLimiter, Verdict};
use super::request::{ApiRequest, RequestBody, populate_headers};
use super::transport::{TransportModifier, chain};
use crate::error::{ApiError, Error, Result};

/// Default timeout of a single HTTP exchange
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Longest error body kept in [`Error::UnexpectedStatus`]
const ERROR_BODY_LIMIT: usize = 512;

/// Vision One API client.
///
/// Cheap to clone; clones share the HTTP connection pool and the rate limiter.
#[derive(Clone)]
pub struct VOneClient {
    domain: String,
    base_url: String,
    token: String,
    http: HttpClient,
    modifier: Option<TransportModifier>,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
}

impl VOneClient {
    /// Create a client for `https://{domain}`.
    pub fn new(domain: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let domain = domain.into();
        let base_url = format!("https://{}", domain);
        Ok(Self {
            http: build_http(None)?,
            domain,
            base_url,
            token: token.into(),
            modifier: None,
            rate_limiter: None,
        })
    }

    /// Point the client at a different scheme/host (mock servers, gateways).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Route every call through `limiter`.
    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn set_rate_limiter(&mut self, limiter: Arc<dyn RateLimiter>) {
        self.rate_limiter = Some(limiter);
    }

    /// Chain a transport modifier after any already installed.
    pub fn add_transport_modifier(&mut self, modifier: TransportModifier) -> Result<()> {
        let combined = chain(self.modifier.take(), modifier);
        self.http = build_http(Some(&combined))?;
        self.modifier = Some(combined);
        Ok(())
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Execute one request: rate limiting, dispatch and response decoding.
    ///
    /// The request's response slots are populated on success. Cancelling
    /// `ctx` aborts the in-flight exchange with [`Error::Cancelled`].
    pub async fn execute<R>(&self, ctx: &CancellationToken, request: &mut R) -> Result<()>
    where
        R: ApiRequest + ?Sized,
    {
        request.base_mut().claim()?;
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(Error::Cancelled),
            result = self.call(request) => result,
        }
    }

    async fn call<R>(&self, request: &mut R) -> Result<()>
    where
        R: ApiRequest + ?Sized,
    {
        match &self.rate_limiter {
            None => self.dispatch(request).await,
            Some(limiter) => self.call_with_limiter(limiter.as_ref(), request).await,
        }
    }

    async fn call_with_limiter<R>(&self, limiter: &dyn RateLimiter, request: &mut R) -> Result<()>
    where
        R: ApiRequest + ?Sized,
    {
        loop {
            if limiter.should_abort().await {
                return Err(Error::Stopped);
            }
            let outcome = self.dispatch(request).await;
            match limiter.check_error(outcome) {
                Verdict::Retry => continue,
                Verdict::Done(result) => return result,
            }
        }
    }

    /// One HTTP exchange for `request`.
    async fn dispatch<R>(&self, request: &mut R) -> Result<()>
    where
        R: ApiRequest + ?Sized,
    {
        let continuation = request.continuation_uri().to_string();
        let following = !continuation.is_empty();
        let uri = if following {
            continuation
        } else {
            format!("{}{}", self.base_url, request.path())
        };
        let method = request.method();
        debug!("{} {}", method, uri);

        let mut builder = self
            .http
            .request(method.clone(), &uri)
            .bearer_auth(&self.token);

        // A continuation link already carries the original query
        if !following && !request.base().parameters().is_empty() {
            let query: Vec<(&String, &String)> = request.base().parameters().iter().collect();
            builder = builder.query(&query);
        }
        for (name, value) in request.base().headers() {
            builder = builder.header(name, value);
        }

        match request.body()? {
            Some(RequestBody::Bytes(bytes)) => {
                builder = builder
                    .header(CONTENT_TYPE, request.content_type())
                    .body(bytes);
            }
            Some(RequestBody::Multipart(form)) => {
                builder = builder.multipart(form);
            }
            None => {}
        }

        let response = builder.send().await?;
        let status = response.status();
        debug!("{} {} -> {}", method, uri, status);

        if !status.is_success() {
            let body = response.bytes().await?;
            return Err(match ApiError::from_body(status.as_u16(), &body) {
                Some(api) => api.into(),
                None => Error::UnexpectedStatus {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&body)
                        .chars()
                        .take(ERROR_BODY_LIMIT)
                        .collect(),
                },
            });
        }

        if let Some(target) = request.response_headers() {
            populate_headers(target, response.headers())?;
        }

        if request.response_target().is_none() {
            request.consume_raw(response);
            return Ok(());
        }

        let body = response.bytes().await?;
        if let Some(target) = request.response_target() {
            target.decode(&body).map_err(|e| {
                Error::InvalidResponse(format!(
                    "{}: {} [{}]",
                    uri,
                    e,
                    String::from_utf8_lossy(&body)
                        .chars()
                        .take(ERROR_BODY_LIMIT)
                        .collect::<String>()
                ))
            })?;
        }
        Ok(())
    }
}

fn build_http(modifier: Option<&TransportModifier>) -> Result<HttpClient> {
    let mut builder = HttpClient::builder().timeout(REQUEST_TIMEOUT);
    if let Some(modifier) = modifier {
        builder = modifier(builder);
    }
    builder.build().map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::rate_limit::{AdaptiveRateLimiter, is_too_many_requests};
    use crate::client::request::{RequestBase, ResponseHeaders, HeaderSlot};
    use crate::error::{ErrorCode, ValidationError};
    use mockito::Matcher;
    use reqwest::Method;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Echo {
        status: String,
    }

    #[derive(Default)]
    struct Usage {
        remaining: i64,
    }

    impl ResponseHeaders for Usage {
        fn slots(&mut self) -> Vec<(&'static str, HeaderSlot<'_>)> {
            vec![(
                "TMV1-Submission-Remaining-Count",
                HeaderSlot::Integer(&mut self.remaining),
            )]
        }
    }

    struct TestRequest {
        base: RequestBase,
        method: Method,
        path: String,
        body: Option<Vec<u8>>,
        response: Option<Echo>,
        headers: Usage,
        raw: Option<reqwest::Response>,
        want_json: bool,
    }

    impl TestRequest {
        fn get(path: &str) -> Self {
            Self {
                base: RequestBase::new(),
                method: Method::GET,
                path: path.to_string(),
                body: None,
                response: None,
                headers: Usage::default(),
                raw: None,
                want_json: true,
            }
        }
    }

    impl ApiRequest for TestRequest {
        fn base(&self) -> &RequestBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut RequestBase {
            &mut self.base
        }
        fn method(&self) -> Method {
            self.method.clone()
        }
        fn path(&self) -> String {
            self.path.clone()
        }
        fn body(&mut self) -> Result<Option<RequestBody>> {
            Ok(self.body.clone().map(RequestBody::Bytes))
        }
        fn response_target(&mut self) -> Option<&mut dyn crate::client::request::ResponseTarget> {
            if self.want_json {
                Some(&mut self.response)
            } else {
                None
            }
        }
        fn response_headers(&mut self) -> Option<&mut dyn ResponseHeaders> {
            Some(&mut self.headers)
        }
        fn consume_raw(&mut self, response: reqwest::Response) {
            self.raw = Some(response);
        }
    }

    async fn client_for(server: &mockito::ServerGuard) -> VOneClient {
        VOneClient::new("example.invalid", "secret-token")
            .unwrap()
            .with_base_url(server.url())
    }

    #[tokio::test]
    async fn test_get_decodes_json_and_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v3.0/healthcheck/connectivity")
            .match_header("authorization", "Bearer secret-token")
            .match_header("content-type", Matcher::Missing)
            .with_status(200)
            .with_header("TMV1-Submission-Remaining-Count", "17")
            .with_body(r#"{"status":"available"}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let mut request = TestRequest::get("/v3.0/healthcheck/connectivity");
        client
            .execute(&CancellationToken::new(), &mut request)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            request.response,
            Some(Echo {
                status: "available".to_string()
            })
        );
        assert_eq!(request.headers.remaining, 17);
    }

    #[tokio::test]
    async fn test_body_sets_content_type_and_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v3.0/echo")
            .match_header("content-type", "application/json")
            .match_query(Matcher::UrlEncoded("top".into(), "50".into()))
            .match_body(r#"{"a":1}"#)
            .with_status(200)
            .with_body(r#"{"status":"ok"}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let mut request = TestRequest::get("/v3.0/echo");
        request.method = Method::POST;
        request.body = Some(br#"{"a":1}"#.to_vec());
        request.base.set_parameter("top", "50");
        client
            .execute(&CancellationToken::new(), &mut request)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_success_body_is_absent_result() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/empty")
            .with_status(204)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let mut request = TestRequest::get("/empty");
        request.response = Some(Echo {
            status: "stale".to_string(),
        });
        client
            .execute(&CancellationToken::new(), &mut request)
            .await
            .unwrap();
        assert!(request.response.is_none());
    }

    #[tokio::test]
    async fn test_malformed_success_body_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/broken")
            .with_status(200)
            .with_body("{\"status\":")
            .create_async()
            .await;

        let client = client_for(&server).await;
        let mut request = TestRequest::get("/broken");
        let err = client
            .execute(&CancellationToken::new(), &mut request)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_structured_error_is_typed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/denied")
            .with_status(403)
            .with_body(r#"{"error":{"code":"AccessDenied","message":"No permission"}}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let mut request = TestRequest::get("/denied");
        let err = client
            .execute(&CancellationToken::new(), &mut request)
            .await
            .unwrap_err();
        let api = err.api().expect("structured error");
        assert_eq!(api.code, ErrorCode::AccessDenied);
        assert_eq!(api.message, "No permission");
        assert_eq!(api.status, 403);
    }

    #[tokio::test]
    async fn test_unstructured_error_keeps_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/gateway")
            .with_status(502)
            .with_body("<html>bad gateway</html>")
            .create_async()
            .await;

        let client = client_for(&server).await;
        let mut request = TestRequest::get("/gateway");
        match client
            .execute(&CancellationToken::new(), &mut request)
            .await
            .unwrap_err()
        {
            Error::UnexpectedStatus { status, body } => {
                assert_eq!(status, 502);
                assert!(body.contains("bad gateway"));
            }
            other => panic!("Expected UnexpectedStatus, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_raw_response_goes_to_consumer() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/report")
            .with_status(200)
            .with_body("%PDF-1.7")
            .create_async()
            .await;

        let client = client_for(&server).await;
        let mut request = TestRequest::get("/report");
        request.want_json = false;
        client
            .execute(&CancellationToken::new(), &mut request)
            .await
            .unwrap();
        let raw = request.raw.take().expect("raw response");
        assert_eq!(raw.bytes().await.unwrap().as_ref(), b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_one_shot_request_cannot_run_twice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/once")
            .with_status(200)
            .with_body(r#"{"status":"ok"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let mut request = TestRequest::get("/once");
        request.base = RequestBase::one_shot();
        let ctx = CancellationToken::new();
        client.execute(&ctx, &mut request).await.unwrap();
        let err = client.execute(&ctx, &mut request).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::AlreadyUsed)
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces() {
        let client = VOneClient::new("example.invalid", "t")
            .unwrap()
            .with_base_url("http://127.0.0.1:1");
        let mut request = TestRequest::get("/x");
        let err = client
            .execute(&CancellationToken::new(), &mut request)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_rate_limited_call_retries_until_ceiling() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/busy")
            .with_status(429)
            .with_body(r#"{"error":{"code":"TooManyRequests","message":"Too many requests"}}"#)
            .expect(3)
            .create_async()
            .await;

        let limiter = Arc::new(AdaptiveRateLimiter::with_bounds(
            Some(Arc::new(is_too_many_requests)),
            None,
            Duration::from_millis(1),
            Duration::from_millis(4),
        ));
        let client = client_for(&server).await.with_rate_limiter(limiter.clone());
        let mut request = TestRequest::get("/busy");
        let err = client
            .execute(&CancellationToken::new(), &mut request)
            .await
            .unwrap_err();

        assert_eq!(err.api().unwrap().code, ErrorCode::TooManyRequests);
        assert_eq!(limiter.current_sleep(), Duration::from_millis(4));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_stopped_limiter_prevents_dispatch() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/never")
            .expect(0)
            .create_async()
            .await;

        let stop = CancellationToken::new();
        stop.cancel();
        let limiter = Arc::new(AdaptiveRateLimiter::new(None, Some(stop)));
        let client = client_for(&server).await.with_rate_limiter(limiter);
        let mut request = TestRequest::get("/never");
        let err = client
            .execute(&CancellationToken::new(), &mut request)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Stopped));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_cancelled_context() {
        let client = VOneClient::new("example.invalid", "t")
            .unwrap()
            .with_base_url("http://127.0.0.1:1");
        let ctx = CancellationToken::new();
        ctx.cancel();
        let mut request = TestRequest::get("/x");
        let err = client.execute(&ctx, &mut request).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
