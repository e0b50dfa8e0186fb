//! Connectivity and quota endpoints

use crate::client::models::{Connectivity, DailyReserve};
use crate::client::request::{ApiRequest, RequestBase, ResponseTarget};

/// `GET /v3.0/healthcheck/connectivity`
#[derive(Debug, Default)]
pub struct CheckConnection {
    base: RequestBase,
    response: Option<Connectivity>,
}

impl CheckConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn response(&self) -> Option<&Connectivity> {
        self.response.as_ref()
    }

    pub fn into_response(self) -> Option<Connectivity> {
        self.response
    }
}

impl ApiRequest for CheckConnection {
    request_base!();

    fn path(&self) -> String {
        "/v3.0/healthcheck/connectivity".to_string()
    }

    fn response_target(&mut self) -> Option<&mut dyn ResponseTarget> {
        Some(&mut self.response)
    }
}

/// `GET /v3.0/sandbox/submissionUsage`
#[derive(Debug, Default)]
pub struct GetDailyReserve {
    base: RequestBase,
    response: Option<DailyReserve>,
}

impl GetDailyReserve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_response(self) -> Option<DailyReserve> {
        self.response
    }
}

impl ApiRequest for GetDailyReserve {
    request_base!();

    fn path(&self) -> String {
        "/v3.0/sandbox/submissionUsage".to_string()
    }

    fn response_target(&mut self) -> Option<&mut dyn ResponseTarget> {
        Some(&mut self.response)
    }
}
