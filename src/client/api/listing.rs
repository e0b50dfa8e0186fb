//! Paginated sandbox listings

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use crate::client::models::{AnalysisResult, Page, Submission, Top, time};
use crate::client::pagination::PaginatedRequest;
use crate::client::request::{ApiRequest, RequestBase, ResponseTarget};

/// Timestamp field a submission listing filters and sorts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeTarget {
    CreatedDateTime,
    LastActionDateTime,
}

impl DateTimeTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            DateTimeTarget::CreatedDateTime => "createdDateTime",
            DateTimeTarget::LastActionDateTime => "lastActionDateTime",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Desc,
    Asc,
}

impl Order {
    pub fn as_str(self) -> &'static str {
        match self {
            Order::Desc => "desc",
            Order::Asc => "asc",
        }
    }
}

/// Listing over `items`/`nextLink` pages of `T`
#[derive(Debug)]
pub struct SandboxList<T> {
    base: RequestBase,
    path: &'static str,
    time_layout: &'static str,
    cursor: String,
    response: Option<Page<T>>,
    _item: PhantomData<fn() -> T>,
}

/// `GET /v3.0/sandbox/tasks`
pub type ListSubmissions = SandboxList<Submission>;

/// `GET /v3.0/sandbox/analysisResults`
pub type ListAnalysisResults = SandboxList<AnalysisResult>;

impl<T> SandboxList<T> {
    fn with_path(path: &'static str, time_layout: &'static str) -> Self {
        Self {
            base: RequestBase::new(),
            path,
            time_layout,
            cursor: String::new(),
            response: None,
            _item: PhantomData,
        }
    }

    pub fn start_date_time(mut self, t: DateTime<Utc>) -> Self {
        let value = t.format(self.time_layout).to_string();
        self.base.set_parameter("startDateTime", value);
        self
    }

    pub fn end_date_time(mut self, t: DateTime<Utc>) -> Self {
        let value = t.format(self.time_layout).to_string();
        self.base.set_parameter("endDateTime", value);
        self
    }

    /// Sort on `field`, e.g. `createdDateTime`.
    pub fn order_by(mut self, field: &str, order: Order) -> Self {
        self.base
            .set_parameter("orderBy", format!("{} {}", field, order.as_str()));
        self
    }

    /// Server-side filter expression
    pub fn filter(mut self, expression: impl Into<String>) -> Self {
        self.base.set_parameter("filter", expression);
        self
    }

    /// Page size
    pub fn top(mut self, top: Top) -> Self {
        self.base.set_parameter("top", top.as_usize().to_string());
        self
    }
}

impl ListSubmissions {
    pub fn new() -> Self {
        Self::with_path("/v3.0/sandbox/tasks", time::TIME_LAYOUT)
    }

    pub fn date_time_target(mut self, target: DateTimeTarget) -> Self {
        self.base.set_parameter("dateTimeTarget", target.as_str());
        self
    }
}

impl Default for ListSubmissions {
    fn default() -> Self {
        Self::new()
    }
}

impl ListAnalysisResults {
    pub fn new() -> Self {
        Self::with_path("/v3.0/sandbox/analysisResults", time::TIME_LAYOUT_Z)
    }
}

impl Default for ListAnalysisResults {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ApiRequest for SandboxList<T>
where
    T: DeserializeOwned + Send,
{
    request_base!();

    fn path(&self) -> String {
        self.path.to_string()
    }

    fn continuation_uri(&self) -> &str {
        &self.cursor
    }

    fn response_target(&mut self) -> Option<&mut dyn ResponseTarget> {
        Some(&mut self.response)
    }
}

impl<T> PaginatedRequest for SandboxList<T>
where
    T: DeserializeOwned + Send,
{
    type Page = Page<T>;

    fn next_link(&self) -> &str {
        &self.cursor
    }

    fn reset_pagination(&mut self) {
        self.cursor.clear();
        self.response = None;
    }

    fn take_page(&mut self) -> Option<Page<T>> {
        let page = self.response.take();
        self.cursor = page
            .as_ref()
            .map(|p| p.next_link.clone())
            .unwrap_or_default();
        page
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::VOneClient;
    use crate::client::pagination::Paginator;
    use chrono::TimeZone;
    use mockito::Matcher;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_filters_become_parameters() {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let request = ListSubmissions::new()
            .start_date_time(start)
            .date_time_target(DateTimeTarget::LastActionDateTime)
            .order_by(DateTimeTarget::CreatedDateTime.as_str(), Order::Asc)
            .filter("status eq 'failed'")
            .top(Top::Top200);

        let params = request.base().parameters();
        assert_eq!(params["startDateTime"], "2024-01-02T03:04:05");
        assert_eq!(params["dateTimeTarget"], "lastActionDateTime");
        assert_eq!(params["orderBy"], "createdDateTime asc");
        assert_eq!(params["filter"], "status eq 'failed'");
        assert_eq!(params["top"], "200");
    }

    #[test]
    fn test_analysis_results_use_zulu_layout() {
        let end = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let request = ListAnalysisResults::new().end_date_time(end);
        assert_eq!(request.base().parameters()["endDateTime"], "2024-01-02T03:04:05Z");
    }

    #[tokio::test]
    async fn test_listing_follows_next_link_without_requery() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/v3.0/sandbox/tasks")
            .match_query(Matcher::Exact("top=50".into()))
            .with_body(format!(
                r#"{{"items":[{{"id":"a","status":"running"}}],"nextLink":"{}/v3.0/sandbox/tasks?skipToken=xyz&top=50"}}"#,
                server.url()
            ))
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/v3.0/sandbox/tasks")
            .match_query(Matcher::UrlEncoded("skipToken".into(), "xyz".into()))
            .with_body(r#"{"items":[{"id":"b","status":"failed"}],"nextLink":""}"#)
            .expect(1)
            .create_async()
            .await;

        let client = VOneClient::new("example.invalid", "t")
            .unwrap()
            .with_base_url(server.url());
        let ctx = CancellationToken::new();
        let mut request = ListSubmissions::new().top(Top::Top50);
        let ids: Vec<String> = Paginator::new(&client, &mut request, |p: Page<Submission>| p.items)
            .collect_all(&ctx)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();

        assert_eq!(ids, vec!["a", "b"]);
        first.assert_async().await;
        second.assert_async().await;
    }
}
