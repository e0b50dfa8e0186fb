//! Endpoint request builders
//!
//! Every endpoint is a single-use [`ApiRequest`](super::request::ApiRequest):
//! - [`health`] - connectivity check and daily submission quota
//! - [`submit`] - file and URL submission
//! - [`results`] - task status, analysis results, indicators, downloads
//! - [`listing`] - paginated task and result listings
//! - [`detections`] - workbench alerts, OAT detections and endpoint inventory

use crate::error::ValidationError;

/// Implements the `base`/`base_mut` accessors for a struct with a `base` field.
macro_rules! request_base {
    () => {
        fn base(&self) -> &$crate::client::request::RequestBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut $crate::client::request::RequestBase {
            &mut self.base
        }
    };
}

pub mod detections;
pub mod health;
pub mod listing;
pub mod results;
pub mod submit;

pub use detections::{
    FILTER_HEADER, ListAlerts, ListEndpoints, ListHighRiskDevices, ListOatDetections, XdrList,
};
pub use health::{CheckConnection, GetDailyReserve};
pub use listing::{DateTimeTarget, ListAnalysisResults, ListSubmissions, Order, SandboxList};
pub use results::{Download, GetAnalysisResults, GetSubmissionStatus, GetSuspiciousObjects};
pub use submit::{SubmitFile, SubmitUrls};

/// Check that a task or result id is a UUID.
pub(crate) fn checked_id(id: &str) -> Result<String, ValidationError> {
    uuid::Uuid::parse_str(id)
        .map(|_| id.to_string())
        .map_err(|_| ValidationError::InvalidId(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_id() {
        assert!(checked_id("012e4eac-9bd9-4e89-95db-77e02f75a6f3").is_ok());
        assert!(matches!(
            checked_id("../../etc/passwd"),
            Err(ValidationError::InvalidId(_))
        ));
        assert!(checked_id("").is_err());
    }
}
