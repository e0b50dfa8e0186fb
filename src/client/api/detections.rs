//! Paginated workbench, OAT and endpoint inventory listings
//!
//! Unlike the sandbox listings these take their filter expression in the
//! `TMV1-Filter` header.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use super::listing::{DateTimeTarget, Order};
use crate::client::models::{
    Endpoint, HighRiskDevice, OatDetection, Page, Top, TopXm, WorkbenchAlert, time,
};
use crate::client::pagination::PaginatedRequest;
use crate::client::request::{ApiRequest, RequestBase, ResponseTarget};

pub const FILTER_HEADER: &str = "TMV1-Filter";

/// Listing over `items`/`nextLink` pages with a header filter
#[derive(Debug)]
pub struct XdrList<T> {
    base: RequestBase,
    path: &'static str,
    cursor: String,
    response: Option<Page<T>>,
    _item: PhantomData<fn() -> T>,
}

/// `GET /v3.0/workbench/alerts`
pub type ListAlerts = XdrList<WorkbenchAlert>;

/// `GET /v3.0/oat/detections`
pub type ListOatDetections = XdrList<OatDetection>;

/// `GET /v3.0/endpointSecurity/endpoints`
pub type ListEndpoints = XdrList<Endpoint>;

/// `GET /v3.0/asrm/highRiskDevices`
pub type ListHighRiskDevices = XdrList<HighRiskDevice>;

impl<T> XdrList<T> {
    fn with_path(path: &'static str) -> Self {
        Self {
            base: RequestBase::new(),
            path,
            cursor: String::new(),
            response: None,
            _item: PhantomData,
        }
    }

    /// Filter expression, e.g. `riskScore ge 70`
    pub fn filter(mut self, expression: impl Into<String>) -> Self {
        self.base.set_header(FILTER_HEADER, expression);
        self
    }

    fn set_time(&mut self, name: &str, t: DateTime<Utc>) {
        self.base
            .set_parameter(name, t.format(time::TIME_LAYOUT_Z).to_string());
    }

    fn set_order(&mut self, field: &str, order: Order) {
        self.base
            .set_parameter("orderBy", format!("{} {}", field, order.as_str()));
    }
}

impl ListAlerts {
    pub fn new() -> Self {
        Self::with_path("/v3.0/workbench/alerts")
    }

    pub fn start_date_time(mut self, t: DateTime<Utc>) -> Self {
        self.set_time("startDateTime", t);
        self
    }

    pub fn end_date_time(mut self, t: DateTime<Utc>) -> Self {
        self.set_time("endDateTime", t);
        self
    }

    pub fn date_time_target(mut self, target: DateTimeTarget) -> Self {
        self.base.set_parameter("dateTimeTarget", target.as_str());
        self
    }

    pub fn order_by(mut self, field: &str, order: Order) -> Self {
        self.set_order(field, order);
        self
    }
}

impl ListOatDetections {
    pub fn new() -> Self {
        Self::with_path("/v3.0/oat/detections")
    }

    pub fn detected_start(mut self, t: DateTime<Utc>) -> Self {
        self.set_time("detectedStartDateTime", t);
        self
    }

    pub fn detected_end(mut self, t: DateTime<Utc>) -> Self {
        self.set_time("detectedEndDateTime", t);
        self
    }

    pub fn ingested_start(mut self, t: DateTime<Utc>) -> Self {
        self.set_time("ingestedStartDateTime", t);
        self
    }

    pub fn ingested_end(mut self, t: DateTime<Utc>) -> Self {
        self.set_time("ingestedEndDateTime", t);
        self
    }

    pub fn top(mut self, top: Top) -> Self {
        self.base.set_parameter("top", top.as_usize().to_string());
        self
    }
}

impl ListEndpoints {
    pub fn new() -> Self {
        Self::with_path("/v3.0/endpointSecurity/endpoints")
    }

    pub fn order_by(mut self, field: &str, order: Order) -> Self {
        self.set_order(field, order);
        self
    }

    pub fn top(mut self, top: Top) -> Self {
        self.base.set_parameter("top", top.as_usize().to_string());
        self
    }
}

impl ListHighRiskDevices {
    pub fn new() -> Self {
        Self::with_path("/v3.0/asrm/highRiskDevices")
    }

    pub fn order_by(mut self, field: &str, order: Order) -> Self {
        self.set_order(field, order);
        self
    }

    pub fn top(mut self, top: TopXm) -> Self {
        self.base.set_parameter("top", top.as_usize().to_string());
        self
    }
}

impl Default for ListAlerts {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for ListOatDetections {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for ListEndpoints {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for ListHighRiskDevices {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ApiRequest for XdrList<T>
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

/// Pages end on an empty `nextLink`; a short page alone does not stop the walk.
impl<T> PaginatedRequest for XdrList<T>
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
